//! Sample and Batch domain types
//!
//! A [`Sample`] is one timestamped measurement produced by the on-device
//! store. A [`Batch`] is one page of samples for a single metric, ordered
//! by ascending effective end time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{MetricType, SampleId};

/// A single immutable time-series sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    id: SampleId,
    metric_type: MetricType,
    value: f64,
    start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_time: Option<DateTime<Utc>>,
}

impl Sample {
    /// Creates a new sample
    ///
    /// # Errors
    /// Returns `ValidationFailed` if `value` is not finite or `end_time`
    /// precedes `start_time`.
    pub fn new(
        id: SampleId,
        metric_type: MetricType,
        value: f64,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Self, DomainError> {
        let sample = Self {
            id,
            metric_type,
            value,
            start_time,
            end_time,
        };
        sample.validate()?;
        Ok(sample)
    }

    /// Re-checks the construction invariants
    ///
    /// Deserialized samples skip [`Sample::new`], so readers of external
    /// input call this before trusting them.
    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.value.is_finite() {
            return Err(DomainError::ValidationFailed(format!(
                "Sample {} has a non-finite value",
                self.id
            )));
        }
        if let Some(end) = self.end_time {
            if end < self.start_time {
                return Err(DomainError::ValidationFailed(format!(
                    "Sample {} ends before it starts",
                    self.id
                )));
            }
        }
        Ok(())
    }

    pub fn id(&self) -> &SampleId {
        &self.id
    }

    pub fn metric_type(&self) -> &MetricType {
        &self.metric_type
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// The timestamp batches are ordered by: `end_time`, or `start_time`
    /// for instantaneous samples.
    pub fn effective_end(&self) -> DateTime<Utc> {
        self.end_time.unwrap_or(self.start_time)
    }
}

/// One bounded page of samples for a single metric
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    metric_type: MetricType,
    samples: Vec<Sample>,
}

impl Batch {
    /// Wraps the samples returned by one Batch Source call
    ///
    /// # Errors
    /// Returns `ValidationFailed` if a sample belongs to another metric or
    /// the samples are not ordered by ascending effective end time.
    pub fn new(metric_type: MetricType, samples: Vec<Sample>) -> Result<Self, DomainError> {
        if let Some(stray) = samples.iter().find(|s| s.metric_type != metric_type) {
            return Err(DomainError::ValidationFailed(format!(
                "Sample {} belongs to {}, not {}",
                stray.id, stray.metric_type, metric_type
            )));
        }
        if samples
            .windows(2)
            .any(|pair| pair[1].effective_end() < pair[0].effective_end())
        {
            return Err(DomainError::ValidationFailed(format!(
                "Batch for {metric_type} is not ordered by end time"
            )));
        }
        Ok(Self {
            metric_type,
            samples,
        })
    }

    pub fn metric_type(&self) -> &MetricType {
        &self.metric_type
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Effective end time of the last sample, i.e. the resume point once
    /// this batch has been uploaded.
    pub fn last_end(&self) -> Option<DateTime<Utc>> {
        self.samples.last().map(Sample::effective_end)
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn metric(name: &str) -> MetricType {
        MetricType::new(name).unwrap()
    }

    fn sample_at(metric_name: &str, offset_secs: i64) -> Sample {
        let start =
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(offset_secs);
        Sample::new(
            SampleId::generate(),
            metric(metric_name),
            72.0,
            start,
            Some(start + Duration::seconds(1)),
        )
        .unwrap()
    }

    #[test]
    fn test_effective_end_prefers_end_time() {
        let s = sample_at("heart_rate", 0);
        assert_eq!(s.effective_end(), s.end_time().unwrap());
    }

    #[test]
    fn test_effective_end_falls_back_to_start() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let s = Sample::new(SampleId::generate(), metric("weight"), 70.5, start, None).unwrap();
        assert_eq!(s.effective_end(), start);
    }

    #[test]
    fn test_non_finite_value_rejected() {
        let start = Utc::now();
        assert!(Sample::new(SampleId::generate(), metric("x"), f64::NAN, start, None).is_err());
        assert!(
            Sample::new(SampleId::generate(), metric("x"), f64::INFINITY, start, None).is_err()
        );
    }

    #[test]
    fn test_end_before_start_rejected() {
        let start = Utc::now();
        let result = Sample::new(
            SampleId::generate(),
            metric("x"),
            1.0,
            start,
            Some(start - Duration::seconds(5)),
        );
        assert!(matches!(result, Err(DomainError::ValidationFailed(_))));
    }

    #[test]
    fn test_sample_json_uses_camel_case() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let s = Sample::new(SampleId::new("s-1").unwrap(), metric("steps"), 10.0, start, None)
            .unwrap();
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["metricType"], "steps");
        assert_eq!(json["startTime"], "2024-01-01T00:00:00Z");
        assert!(json.get("endTime").is_none());
    }

    #[test]
    fn test_deserialized_sample_can_be_validated() {
        let json = serde_json::json!({
            "id": "s-1",
            "metricType": "steps",
            "value": 3.0,
            "startTime": "2024-01-01T00:10:00Z",
            "endTime": "2024-01-01T00:00:00Z"
        });
        let s: Sample = serde_json::from_value(json).unwrap();
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_batch_last_end() {
        let batch = Batch::new(
            metric("heart_rate"),
            vec![sample_at("heart_rate", 0), sample_at("heart_rate", 60)],
        )
        .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.last_end(), Some(batch.samples()[1].effective_end()));
    }

    #[test]
    fn test_empty_batch() {
        let batch = Batch::new(metric("heart_rate"), Vec::new()).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.last_end(), None);
    }

    #[test]
    fn test_batch_rejects_foreign_metric() {
        let result = Batch::new(
            metric("heart_rate"),
            vec![sample_at("heart_rate", 0), sample_at("steps", 10)],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_batch_rejects_unordered_samples() {
        let result = Batch::new(
            metric("heart_rate"),
            vec![sample_at("heart_rate", 60), sample_at("heart_rate", 0)],
        );
        assert!(result.is_err());
    }
}
