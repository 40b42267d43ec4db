//! Aggregate pass/fail criteria, written the way k6 users write them:
//! `http_req_duration:p(95)<500` or `checks:rate>0.99`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ThresholdError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Request latency in milliseconds.
    HttpReqDuration,
    /// Share of recorded checks that passed.
    Checks,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::HttpReqDuration => "http_req_duration",
            Metric::Checks => "checks",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregate {
    Percentile(f64),
    Avg,
    Min,
    Max,
    Rate,
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregate::Percentile(p) => write!(f, "p({})", p),
            Aggregate::Avg => write!(f, "avg"),
            Aggregate::Min => write!(f, "min"),
            Aggregate::Max => write!(f, "max"),
            Aggregate::Rate => write!(f, "rate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl Comparison {
    fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Lt => lhs < rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Ge => lhs >= rhs,
            Comparison::Eq => (lhs - rhs).abs() < f64::EPSILON,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Eq => "==",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: Metric,
    pub aggregate: Aggregate,
    pub comparison: Comparison,
    pub limit: f64,
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}{}{}",
            self.metric.as_str(),
            self.aggregate,
            self.comparison.as_str(),
            self.limit
        )
    }
}

impl FromStr for Threshold {
    type Err = ThresholdError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let (metric, expr) = raw
            .split_once(':')
            .ok_or_else(|| ThresholdError::MissingMetric(raw.to_string()))?;
        let metric = match metric.trim() {
            "http_req_duration" => Metric::HttpReqDuration,
            "checks" => Metric::Checks,
            other => return Err(ThresholdError::UnknownMetric(other.to_string())),
        };

        let expr: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
        let bad = || ThresholdError::BadExpression(expr.clone());

        let op_at = expr.find(['<', '>', '=']).ok_or_else(bad)?;
        let (lhs, rest) = expr.split_at(op_at);
        let (comparison, rhs) = if let Some(rhs) = rest.strip_prefix("<=") {
            (Comparison::Le, rhs)
        } else if let Some(rhs) = rest.strip_prefix(">=") {
            (Comparison::Ge, rhs)
        } else if let Some(rhs) = rest.strip_prefix("==") {
            (Comparison::Eq, rhs)
        } else if let Some(rhs) = rest.strip_prefix('<') {
            (Comparison::Lt, rhs)
        } else if let Some(rhs) = rest.strip_prefix('>') {
            (Comparison::Gt, rhs)
        } else {
            return Err(bad());
        };
        let limit: f64 = rhs.parse().map_err(|_| bad())?;

        let aggregate = match lhs {
            "avg" => Aggregate::Avg,
            "min" => Aggregate::Min,
            "max" => Aggregate::Max,
            "rate" => Aggregate::Rate,
            p => {
                let inner = p
                    .strip_prefix("p(")
                    .and_then(|s| s.strip_suffix(')'))
                    .ok_or_else(bad)?;
                let pct: f64 = inner.parse().map_err(|_| bad())?;
                if !(0.0..=100.0).contains(&pct) {
                    return Err(bad());
                }
                Aggregate::Percentile(pct)
            }
        };

        let valid = match metric {
            Metric::Checks => aggregate == Aggregate::Rate,
            Metric::HttpReqDuration => aggregate != Aggregate::Rate,
        };
        if !valid {
            return Err(bad());
        }

        Ok(Threshold {
            metric,
            aggregate,
            comparison,
            limit,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds(pub Vec<Threshold>);

impl Default for Thresholds {
    /// p95 under half a second, 99% of checks passing.
    fn default() -> Self {
        Self(vec![
            Threshold {
                metric: Metric::HttpReqDuration,
                aggregate: Aggregate::Percentile(95.0),
                comparison: Comparison::Lt,
                limit: 500.0,
            },
            Threshold {
                metric: Metric::Checks,
                aggregate: Aggregate::Rate,
                comparison: Comparison::Gt,
                limit: 0.99,
            },
        ])
    }
}

impl Thresholds {
    pub fn parse_all<S: AsRef<str>>(raw: &[S]) -> Result<Self, ThresholdError> {
        raw.iter()
            .map(|s| s.as_ref().parse())
            .collect::<Result<Vec<_>, _>>()
            .map(Thresholds)
    }
}

/// What the load engine aggregated over the whole run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub checks_passed: usize,
    pub checks_failed: usize,
    /// Latency histogram: milliseconds -> request count.
    pub latencies: BTreeMap<usize, usize>,
}

impl RunSummary {
    pub fn requests(&self) -> usize {
        self.latencies.values().sum()
    }

    pub fn check_rate(&self) -> Option<f64> {
        let total = self.checks_passed + self.checks_failed;
        (total > 0).then(|| self.checks_passed as f64 / total as f64)
    }

    /// Nearest-rank percentile.
    pub fn percentile(&self, pct: f64) -> Option<f64> {
        let total = self.requests();
        if total == 0 {
            return None;
        }
        let rank = ((pct / 100.0) * total as f64).ceil().max(1.0) as usize;
        let mut seen = 0;
        for (&ms, &count) in &self.latencies {
            seen += count;
            if seen >= rank {
                return Some(ms as f64);
            }
        }
        self.latencies.keys().next_back().map(|&ms| ms as f64)
    }

    pub fn mean(&self) -> Option<f64> {
        let total = self.requests();
        (total > 0).then(|| {
            let sum: usize = self.latencies.iter().map(|(ms, count)| ms * count).sum();
            sum as f64 / total as f64
        })
    }

    fn observe(&self, threshold: &Threshold) -> Option<f64> {
        match threshold.aggregate {
            Aggregate::Rate => self.check_rate(),
            Aggregate::Percentile(p) => self.percentile(p),
            Aggregate::Avg => self.mean(),
            Aggregate::Min => self.latencies.keys().next().map(|&ms| ms as f64),
            Aggregate::Max => self.latencies.keys().next_back().map(|&ms| ms as f64),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdResult {
    pub threshold: Threshold,
    /// `None` when the run produced no samples for the metric.
    pub observed: Option<f64>,
    pub passed: bool,
}

/// A threshold with no samples is reported but not counted as breached.
pub fn evaluate(thresholds: &Thresholds, summary: &RunSummary) -> Vec<ThresholdResult> {
    thresholds
        .0
        .iter()
        .map(|threshold| {
            let observed = summary.observe(threshold);
            let passed = observed
                .map(|value| threshold.comparison.holds(value, threshold.limit))
                .unwrap_or(true);
            ThresholdResult {
                threshold: threshold.clone(),
                observed,
                passed,
            }
        })
        .collect()
}
