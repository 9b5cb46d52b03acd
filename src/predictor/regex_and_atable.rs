use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::config::RegexAndAtableConfig;
use crate::error::Result;
use crate::model::DiffAndAtables;

use super::{FolderScores, Mailbox, Predictor, unknown_mailbox};

/// One [`DiffAndAtables`] per mailbox for each configured minimum segment
/// length; a mailbox's score is the mean over those lengths.
#[derive(Debug, Clone)]
pub struct RegexAndAtable {
    segment_lengths: Vec<usize>,
    matcher_size_limit: usize,
    boxes: BTreeMap<String, Vec<DiffAndAtables>>,
}

impl RegexAndAtable {
    pub fn new(config: &RegexAndAtableConfig) -> Self {
        Self {
            segment_lengths: config.segment_lengths.clone(),
            matcher_size_limit: config.matcher_size_limit,
            boxes: BTreeMap::new(),
        }
    }

    /// Models held for `mailbox`, in segment length order.
    pub fn models(&self, mailbox: &str) -> Option<&[DiffAndAtables]> {
        self.boxes.get(mailbox).map(Vec::as_slice)
    }

    /// Apply `update` to a copy of every model of `mailbox`, then swap the
    /// copies in. On error the mailbox keeps all of its old models.
    fn update_models<F>(&mut self, mailbox: &str, update: F) -> Result<()>
    where
        F: Fn(&mut DiffAndAtables) -> Result<()> + Sync,
    {
        let models = self
            .boxes
            .get(mailbox)
            .ok_or_else(|| unknown_mailbox(mailbox))?;

        let updated = models
            .par_iter()
            .map(|model| {
                let mut model = model.clone();
                update(&mut model)?;
                Ok(model)
            })
            .collect::<Result<Vec<_>>>()?;

        self.boxes.insert(mailbox.to_owned(), updated);
        Ok(())
    }
}

impl Predictor for RegexAndAtable {
    fn add_headers(&mut self, headers: &str, mailbox: &str) -> Result<()> {
        let sample = [headers.to_owned()];
        self.update_models(mailbox, |model| model.add_strings(&sample))
    }

    fn remove_headers(&mut self, headers: &str, mailbox: &str) -> Result<()> {
        let sample = [headers.to_owned()];
        self.update_models(mailbox, |model| model.remove_strings(&sample))
    }

    fn consider_box(&mut self, mailbox: &Mailbox) -> Result<()> {
        let corpus: Vec<String> = mailbox.header_blocks().map(str::to_owned).collect();

        let models = self
            .segment_lengths
            .par_iter()
            .map(|&min_length| {
                DiffAndAtables::from_strings_with_limit(
                    corpus.clone(),
                    min_length,
                    self.matcher_size_limit,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        log::info!(
            "regex predictor built {} models over {} headers for {}",
            models.len(),
            corpus.len(),
            mailbox.qualified_name
        );
        self.boxes.insert(mailbox.qualified_name.clone(), models);
        Ok(())
    }

    fn folder_score(&self, headers: &str) -> FolderScores {
        self.boxes
            .par_iter()
            .map(|(name, models)| {
                let score = if models.is_empty() {
                    0.0
                } else {
                    models.iter().map(|m| m.confidence_for(headers)).sum::<f64>()
                        / models.len() as f64
                };
                (name.clone(), score)
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "regex"
    }
}
