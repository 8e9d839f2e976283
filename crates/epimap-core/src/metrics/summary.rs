use chrono::NaiveDate;
use serde::Serialize;

use super::{value_at, MetricKind};
use crate::classify::palette::LisaCluster;
use crate::dataset::Dataset;
use crate::error::MetricError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricValue {
    pub metric: MetricKind,
    pub value: f64,
}

/// Significance annotation for one feature, when the spatial statistic for
/// the current view is already known.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LisaNote {
    pub cluster: LisaCluster,
    pub p_value: f64,
}

/// Everything the hover card shows for one feature on one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSummary {
    pub feature: usize,
    pub name: Option<String>,
    pub date: NaiveDate,
    pub population: Option<f64>,
    pub beds: Option<f64>,
    /// All ten metrics, in [`MetricKind::ALL`] order.
    pub metrics: Vec<MetricValue>,
    pub lisa: Option<LisaNote>,
}

impl FeatureSummary {
    pub fn at(ds: &Dataset, feature: usize, date: NaiveDate) -> Result<Self, MetricError> {
        if feature >= ds.feature_count() {
            return Err(MetricError::UnknownFeature { feature, count: ds.feature_count() });
        }
        let d = ds
            .date_index(date)
            .ok_or_else(|| MetricError::UnknownDate { dataset: ds.id.clone(), date })?;
        Ok(Self {
            feature,
            name: ds.names[feature].clone(),
            date,
            population: ds.population[feature],
            beds: ds.beds[feature],
            metrics: MetricKind::ALL
                .into_iter()
                .map(|metric| MetricValue { metric, value: value_at(ds, metric, d, feature) })
                .collect(),
            lisa: None,
        })
    }

    pub fn value(&self, metric: MetricKind) -> Option<f64> {
        self.metrics.iter().find(|m| m.metric == metric).map(|m| m.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::derive;
    use crate::metrics::fixtures::{three_counties, ymd};

    #[test]
    fn summary_matches_per_metric_derivation() {
        let ds = three_counties();
        let s = FeatureSummary::at(&ds, 0, ymd(5, 2)).unwrap();
        assert_eq!(s.name.as_deref(), Some("Alpha"));
        assert_eq!(s.metrics.len(), 10);
        for kind in MetricKind::ALL {
            assert_eq!(s.value(kind), Some(derive(&ds, kind, ymd(5, 2)).unwrap()[0]));
        }
        assert!(s.lisa.is_none());
    }

    #[test]
    fn out_of_range_feature_is_rejected() {
        let ds = three_counties();
        assert_eq!(
            FeatureSummary::at(&ds, 3, ymd(5, 2)).unwrap_err(),
            MetricError::UnknownFeature { feature: 3, count: 3 }
        );
    }
}
