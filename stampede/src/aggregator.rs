use crate::error::BenchError;
use stampede_core::{ClientSample, Epoch, Report, Role, Sample, SampleGroup};
use std::sync::Mutex;

/// Collects worker samples as they finish and turns them into a [`Report`].
#[derive(Debug)]
pub struct Aggregator {
    name: String,
    epoch: Epoch,
    publishers: Mutex<Vec<(usize, ClientSample)>>,
    subscribers: Mutex<Vec<(usize, ClientSample)>>,
}

impl Aggregator {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            epoch: Epoch::now(),
            publishers: Mutex::new(vec![]),
            subscribers: Mutex::new(vec![]),
        }
    }

    pub fn add(
        &self,
        role: Role,
        index: usize,
        client_id: &str,
        sample: Sample,
    ) -> Result<(), BenchError> {
        let samples = match role {
            Role::Publisher => &self.publishers,
            Role::Subscriber => &self.subscribers,
        };
        samples.lock()?.push((
            index,
            ClientSample {
                client_id: client_id.to_string(),
                sample,
            },
        ));
        Ok(())
    }

    /// Build the report from everything collected so far, ordered by spawn index.
    pub fn finalize(&self) -> Result<Report, BenchError> {
        Ok(Report {
            name: self.name.clone(),
            epoch: self.epoch,
            publishers: Self::ordered(&self.publishers)?,
            subscribers: Self::ordered(&self.subscribers)?,
        })
    }

    fn ordered(samples: &Mutex<Vec<(usize, ClientSample)>>) -> Result<SampleGroup, BenchError> {
        let mut samples = samples.lock()?.clone();
        samples.sort_by_key(|(index, _)| *index);
        Ok(SampleGroup::new(
            samples.into_iter().map(|(_, sample)| sample).collect(),
        ))
    }
}
