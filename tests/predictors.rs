use chrono::{TimeZone, Utc};
use mailfamiliar_core::predictor::{
    Engine, MailMessage, Mailbox, Predictor, PredictorKind, create_all,
};
use mailfamiliar_core::{EngineConfig, EngineError};

fn message(headers: String) -> MailMessage {
    let date = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
    MailMessage::new(headers, date)
}

fn receipt(order: u32) -> String {
    format!(
        "Return-Path: <orders@shop.example>\r\nFrom: Shop <orders@shop.example>\r\nSubject: Order {order} has shipped\r\nX-Mailer: shopmail\r\n"
    )
}

fn list_post(author: &str, topic: &str) -> String {
    format!(
        "From: {author} <{author}@lists.example>\r\nList-Id: <dev.lists.example>\r\nSubject: [dev] {topic}\r\nPrecedence: list\r\n"
    )
}

fn mailboxes() -> Vec<Mailbox> {
    vec![
        Mailbox::new("Receipts", [1001, 1002, 1017, 1230].map(|n| message(receipt(n))).to_vec()),
        Mailbox::new(
            "Lists/dev",
            vec![
                message(list_post("alice", "release notes")),
                message(list_post("bob", "flaky build")),
                message(list_post("carol", "review request")),
            ],
        ),
        Mailbox::new("Empty", Vec::new()),
    ]
}

fn loaded(kind: PredictorKind) -> Engine {
    let mut engine = Engine::new(kind, &EngineConfig::builtin());
    for mailbox in &mailboxes() {
        engine.consider_box(mailbox).unwrap();
    }
    engine
}

#[test]
fn every_predictor_scores_every_registered_mailbox() {
    for (kind, mut engine) in create_all(&EngineConfig::builtin()) {
        for mailbox in &mailboxes() {
            engine.consider_box(mailbox).unwrap();
        }

        let scores = engine.folder_score(&receipt(1500));
        assert_eq!(scores.len(), 3, "{kind}");
        for (name, score) in &scores {
            assert!((0.0..=1.0).contains(score), "{kind} {name}: {score}");
        }
        assert_eq!(scores["Empty"], 0.0, "{kind}");
    }
}

#[test]
fn every_predictor_recommends_the_matching_mailbox() {
    for kind in PredictorKind::ALL {
        let engine = loaded(kind);
        assert_eq!(
            engine.folder_for(&list_post("dave", "meeting notes")).as_deref(),
            Some("Lists/dev"),
            "{kind}"
        );
        assert_eq!(engine.folder_for(&receipt(1012)).as_deref(), Some("Receipts"), "{kind}");
    }
}

#[test]
fn cross_correlation_fully_trusts_a_stored_header() {
    let engine = loaded(PredictorKind::CrossCorrelate);
    assert_eq!(engine.folder_score(&receipt(1017))["Receipts"], 1.0);
}

#[test]
fn unregistered_mailboxes_are_rejected() {
    for kind in PredictorKind::ALL {
        let mut engine = loaded(kind);
        let added = engine.add_headers(&receipt(1), "Archive");
        assert!(
            matches!(added, Err(EngineError::UnknownMailbox(ref name)) if name == "Archive"),
            "{kind}"
        );
        assert!(engine.remove_headers(&receipt(1), "Archive").is_err(), "{kind}");
    }
}

#[test]
fn removing_headers_undoes_adding_them() {
    for kind in PredictorKind::ALL {
        let mut engine = loaded(kind);
        let stray = "From: someone@else.example\r\nSubject: hi\r\n";
        let before = engine.folder_score(stray);

        engine.add_headers(stray, "Receipts").unwrap();
        engine.remove_headers(stray, "Receipts").unwrap();

        assert_eq!(engine.folder_score(stray), before, "{kind}");
    }
}

#[test]
fn mistakes_only_apply_to_the_thresholded_predictor() {
    let mut engine = loaded(PredictorKind::Traat);
    let candidate = receipt(1017);

    engine
        .as_traat_mut()
        .unwrap()
        .add_mistake(&candidate, "Receipts")
        .unwrap();
    assert_eq!(engine.folder_score(&candidate)["Receipts"], 0.0);

    assert!(loaded(PredictorKind::RegexAndAtable).as_traat_mut().is_none());
}

#[test]
fn readding_an_earlier_header_restores_scores() {
    for kind in PredictorKind::ALL {
        let mut engine = loaded(kind);
        let candidate = receipt(2042);
        let before = engine.folder_score(&candidate);

        engine.remove_headers(&receipt(1001), "Receipts").unwrap();
        engine.add_headers(&receipt(1001), "Receipts").unwrap();

        assert_eq!(engine.folder_score(&candidate), before, "{kind}");
    }
}
