use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::config::ThresholdConfig;
use crate::error::Result;
use crate::model::ThresholdedDiffAndAtables;

use super::{FolderScores, Mailbox, Predictor, unknown_mailbox};

/// One [`ThresholdedDiffAndAtables`] per mailbox, plus a second model per
/// mailbox of headers that were wrongly filed there. A mailbox's score is its
/// own confidence minus the confidence of its mistakes.
#[derive(Debug, Clone)]
pub struct ThresholdedRegexAndAtable {
    limits: ThresholdConfig,
    boxes: BTreeMap<String, ThresholdedDiffAndAtables>,
    mistakes: BTreeMap<String, ThresholdedDiffAndAtables>,
}

impl ThresholdedRegexAndAtable {
    pub fn new(limits: &ThresholdConfig) -> Self {
        Self {
            limits: limits.clone(),
            boxes: BTreeMap::new(),
            mistakes: BTreeMap::new(),
        }
    }

    pub fn model(&self, mailbox: &str) -> Option<&ThresholdedDiffAndAtables> {
        self.boxes.get(mailbox)
    }

    pub fn mistakes_for(&self, mailbox: &str) -> Option<&ThresholdedDiffAndAtables> {
        self.mistakes.get(mailbox)
    }

    /// Record that `headers` was moved into `errant_destination` by mistake.
    pub fn add_mistake(&mut self, headers: &str, errant_destination: &str) -> Result<()> {
        match self.mistakes.get_mut(errant_destination) {
            Some(model) => model.add_string(headers)?,
            None => {
                let model = ThresholdedDiffAndAtables::from_strings(&[headers], &self.limits)?;
                self.mistakes.insert(errant_destination.to_string(), model);
            }
        }

        log::debug!("recorded mistaken move into {errant_destination}");
        Ok(())
    }

    fn model_mut(&mut self, mailbox: &str) -> Result<&mut ThresholdedDiffAndAtables> {
        self.boxes
            .get_mut(mailbox)
            .ok_or_else(|| unknown_mailbox(mailbox))
    }

    fn mistake_score(&self, mailbox: &str, headers: &str) -> f64 {
        self.mistakes
            .get(mailbox)
            .map_or(0.0, |model| model.confidence_for(headers))
    }
}

impl Predictor for ThresholdedRegexAndAtable {
    fn add_headers(&mut self, headers: &str, mailbox: &str) -> Result<()> {
        if !self.boxes.contains_key(mailbox) {
            return Err(unknown_mailbox(mailbox));
        }

        // A header filed here on purpose is no longer a mistake. Both models
        // change together or not at all.
        let cleared = match self.mistakes.get(mailbox) {
            Some(mistakes) if mistakes.contains(headers) => {
                let mut mistakes = mistakes.clone();
                mistakes.remove_string(headers)?;
                Some(mistakes)
            }
            _ => None,
        };

        self.model_mut(mailbox)?.add_string(headers)?;
        if let Some(mistakes) = cleared {
            self.mistakes.insert(mailbox.to_owned(), mistakes);
        }
        Ok(())
    }

    fn remove_headers(&mut self, headers: &str, mailbox: &str) -> Result<()> {
        self.model_mut(mailbox)?.remove_string(headers)?;
        Ok(())
    }

    fn consider_box(&mut self, mailbox: &Mailbox) -> Result<()> {
        let headers: Vec<&str> = mailbox.header_blocks().collect();
        let model = ThresholdedDiffAndAtables::from_strings(headers.as_slice(), &self.limits)?;

        log::info!(
            "thresholded predictor clustered {} headers for {}",
            headers.len(),
            mailbox.qualified_name
        );
        self.boxes.insert(mailbox.qualified_name.clone(), model);
        Ok(())
    }

    fn folder_score(&self, headers: &str) -> FolderScores {
        self.boxes
            .par_iter()
            .map(|(name, model)| {
                let score = model.confidence_for(headers) - self.mistake_score(name, headers);
                (name.clone(), score.clamp(0.0, 1.0))
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "thresholded regex"
    }
}
