//! 指标模块
//!
//! 基于 metrics crate 记录客群引擎的业务指标。
//! 未安装 recorder 时所有记录操作为空操作。

/// 注册指标描述信息
pub fn describe_metrics() {
    metrics::describe_counter!(
        "segment_audience_evaluations_total",
        "Total number of audience evaluations"
    );
    metrics::describe_histogram!(
        "segment_audience_evaluation_duration_seconds",
        "Audience evaluation duration in seconds"
    );
    metrics::describe_counter!(
        "segment_suggestions_total",
        "Total number of rule suggestions by outcome"
    );
    metrics::describe_counter!(
        "segment_stale_results_discarded_total",
        "Audience results dropped because a newer edit superseded them"
    );
}

/// 记录一次客群人数评估
#[inline]
pub fn record_audience_evaluation(population: usize, duration_secs: f64) {
    metrics::counter!("segment_audience_evaluations_total").increment(1);
    metrics::histogram!(
        "segment_audience_evaluation_duration_seconds",
        "population_bucket" => population_bucket(population)
    )
    .record(duration_secs);
}

/// 记录一次规则建议
///
/// outcome: accepted / partial / fallback
#[inline]
pub fn record_suggestion(outcome: &'static str) {
    metrics::counter!("segment_suggestions_total", "outcome" => outcome).increment(1);
}

/// 记录一次被新编辑取代而丢弃的评估结果
#[inline]
pub fn record_stale_discard() {
    metrics::counter!("segment_stale_results_discarded_total").increment(1);
}

fn population_bucket(population: usize) -> &'static str {
    match population {
        0..=999 => "small",
        1_000..=99_999 => "medium",
        _ => "large",
    }
}
