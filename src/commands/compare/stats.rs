use std::collections::HashSet;

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonStats {
    pub total: u64,
    pub identical: u64,
    pub different: u64,
    pub different_percent: f64,
    pub diff_ratio_sum: f64,
    pub diff_ratio_count: u64,
    pub average_divergence_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Identical,
    Different {
        only_in_main: Vec<String>,
        only_in_other: Vec<String>,
    },
}

impl ComparisonStats {
    // Identity is order-sensitive; the divergence diagnostics are not.
    pub fn record(&mut self, main: &[String], other: &[String]) -> Verdict {
        self.total += 1;

        if main == other {
            self.identical += 1;
            self.refresh_derived();
            return Verdict::Identical;
        }

        self.different += 1;
        let (only_in_main, only_in_other) = set_difference(main, other);
        if !only_in_main.is_empty()
            && only_in_main.len() == only_in_other.len()
            && main.len() == other.len()
        {
            self.diff_ratio_sum += only_in_main.len() as f64 / main.len() as f64;
            self.diff_ratio_count += 1;
        }
        self.refresh_derived();

        Verdict::Different {
            only_in_main,
            only_in_other,
        }
    }

    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = Self {
            total: self.total + other.total,
            identical: self.identical + other.identical,
            different: self.different + other.different,
            diff_ratio_sum: self.diff_ratio_sum + other.diff_ratio_sum,
            diff_ratio_count: self.diff_ratio_count + other.diff_ratio_count,
            ..Self::default()
        };
        merged.refresh_derived();
        merged
    }

    fn refresh_derived(&mut self) {
        self.different_percent = if self.total > 0 {
            self.different as f64 / self.total as f64 * 100.0
        } else {
            0.0
        };
        self.average_divergence_percent = if self.diff_ratio_count > 0 {
            self.diff_ratio_sum / self.diff_ratio_count as f64 * 100.0
        } else {
            0.0
        };
    }
}

pub fn set_difference(main: &[String], other: &[String]) -> (Vec<String>, Vec<String>) {
    let main_set: HashSet<&str> = main.iter().map(String::as_str).collect();
    let other_set: HashSet<&str> = other.iter().map(String::as_str).collect();

    let mut only_in_main: Vec<String> = main_set
        .difference(&other_set)
        .map(|id| (*id).to_string())
        .collect();
    let mut only_in_other: Vec<String> = other_set
        .difference(&main_set)
        .map(|id| (*id).to_string())
        .collect();
    only_in_main.sort();
    only_in_other.sort();

    (only_in_main, only_in_other)
}
