//! Arrival order of a model's samples
//!
//! Templates and clusters are built greedily, so what a model looks like
//! depends on the order its samples arrived in. [`Arrivals`] keeps that order
//! and remembers where recently withdrawn samples sat, so withdrawing a sample
//! and admitting it again puts it back where it was.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arrivals {
    samples: Vec<String>,
    /// Withdrawn samples with the position each held, latest last. Cleared by
    /// any admission that is not a restore.
    withdrawn: Vec<(usize, String)>,
}

impl Arrivals {
    pub fn new(samples: Vec<String>) -> Self {
        Self {
            samples,
            withdrawn: Vec::new(),
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn contains(&self, sample: &str) -> bool {
        self.samples.iter().any(|s| s == sample)
    }

    /// Whether admitting `samples` in order only ever appends, so a model can
    /// absorb them without replaying earlier arrivals.
    pub fn admits_at_tail<S: AsRef<str>>(&self, samples: &[S]) -> bool {
        let mut len = self.samples.len();
        let mut restorable = self.withdrawn.iter().rev();

        for sample in samples {
            match restorable.next() {
                Some((position, withdrawn)) if withdrawn == sample.as_ref() => {
                    if *position < len {
                        return false;
                    }
                }
                // Everything from a fresh sample on is appended.
                _ => return true,
            }
            len += 1;
        }
        true
    }

    /// Append `sample`, or put it back where it was if it is the sample most
    /// recently withdrawn.
    pub fn admit(&mut self, sample: &str) {
        match self.withdrawn.last() {
            Some((_, withdrawn)) if withdrawn == sample => {
                if let Some((position, restored)) = self.withdrawn.pop() {
                    let position = position.min(self.samples.len());
                    self.samples.insert(position, restored);
                }
            }
            _ => {
                self.withdrawn.clear();
                self.samples.push(sample.to_owned());
            }
        }
    }

    pub fn admit_all<S: AsRef<str>>(&mut self, samples: &[S]) {
        for sample in samples {
            self.admit(sample.as_ref());
        }
    }

    /// Withdraw the latest occurrence of `sample`. Returns `false` if there is
    /// none.
    pub fn withdraw(&mut self, sample: &str) -> bool {
        let Some(position) = self.samples.iter().rposition(|s| s == sample) else {
            return false;
        };

        let withdrawn = self.samples.remove(position);
        self.withdrawn.push((position, withdrawn));
        true
    }
}
