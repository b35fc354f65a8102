use serde::{Deserialize, Serialize};

use crate::config::ClusterConfig;
use crate::photo::LocatedPhoto;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhotoQuality {
    Reliable,
    /// Coordinates present but the reported accuracy radius is too large.
    /// Still bucketed; only counts against the cluster it lands in.
    LowAccuracy,
}

impl PhotoQuality {
    pub fn classify(photo: &LocatedPhoto, threshold_m: f64) -> Self {
        match photo.accuracy_m {
            Some(accuracy) if accuracy > threshold_m => PhotoQuality::LowAccuracy,
            _ => PhotoQuality::Reliable,
        }
    }
}

/// Noise policy for a candidate cluster.
#[derive(Debug, Clone, Copy)]
pub struct NoisePolicy {
    pub low_accuracy_threshold_m: f64,
    pub min_session_size: usize,
    pub min_group_photos: usize,
}

impl From<&ClusterConfig> for NoisePolicy {
    fn from(config: &ClusterConfig) -> Self {
        Self {
            low_accuracy_threshold_m: config.low_accuracy_threshold_m,
            min_session_size: config.min_session_size,
            min_group_photos: config.min_group_photos,
        }
    }
}

impl NoisePolicy {
    pub fn low_accuracy_count<'a, I>(&self, members: I) -> usize
    where
        I: IntoIterator<Item = &'a LocatedPhoto>,
    {
        members
            .into_iter()
            .filter(|p| {
                PhotoQuality::classify(p, self.low_accuracy_threshold_m) == PhotoQuality::LowAccuracy
            })
            .count()
    }

    /// A cluster is noise when it is below the sparseness floor, or when it
    /// is small and most of its photos have low-accuracy GPS.
    pub fn is_noise(&self, members: &[&LocatedPhoto]) -> bool {
        let count = members.len();
        if count < self.min_group_photos {
            return true;
        }
        if count >= self.min_session_size {
            return false;
        }
        let low = self.low_accuracy_count(members.iter().copied());
        low * 2 > count
    }
}
