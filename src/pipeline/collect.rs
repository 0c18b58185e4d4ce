//! Metric extraction from command output
//!
//! Parsers are pure: they turn captured stdout into [`MetricSample`]s and
//! leave duplicate detection to the caller's [`SampleSet`](crate::results::SampleSet).

use crate::results::{MetricSample, Phase, Unit};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

use super::config::ProfilerKind;

/// Wall time of the build command
pub const BUILD_DURATION: &str = "build.duration";
/// Wall time of the install command
pub const DEPLOY_DURATION: &str = "deploy.duration";
/// Wall time of the launch command
pub const LAUNCH_DURATION: &str = "launch.duration";
/// `TotalTime` reported by `am start -W`
pub const LAUNCH_TOTAL_TIME: &str = "launch.total-time";
/// `WaitTime` reported by `am start -W`
pub const LAUNCH_WAIT_TIME: &str = "launch.wait-time";
/// `ThisTime` reported by `am start -W`
pub const LAUNCH_THIS_TIME: &str = "launch.this-time";
/// Total proportional set size after the monitor window
pub const MEMORY_TOTAL_PSS: &str = "memory.total-pss";

static LAUNCH_LINE_RE: OnceLock<Regex> = OnceLock::new();
static TOTAL_PSS_RE: OnceLock<Regex> = OnceLock::new();
static PROFILER_LINE_RE: OnceLock<Regex> = OnceLock::new();

/// Sample for a timed stage
pub fn duration_sample(key: &str, phase: Phase, elapsed: Duration) -> MetricSample {
    MetricSample::new(key, elapsed.as_secs_f64() * 1000.0, Unit::Ms, phase)
}

/// Parse `am start -W` output.
///
/// Returns an error when the launcher reports that the activity did not
/// start. Output without timing lines yields no samples; custom launchers
/// are not required to print them.
pub fn parse_launch_output(stdout: &str) -> Result<Vec<MetricSample>, String> {
    let re = LAUNCH_LINE_RE.get_or_init(|| {
        Regex::new(r"^\s*(TotalTime|WaitTime|ThisTime|Status|Error):\s*(.*?)\s*$")
            .expect("launch line regex is valid")
    });

    let mut samples = Vec::new();
    for line in stdout.lines() {
        let Some(caps) = re.captures(line) else {
            continue;
        };
        let value = &caps[2];
        let key = match &caps[1] {
            "Error" => return Err(format!("launcher reported: {}", value)),
            "Status" if value != "ok" => return Err(format!("launch status: {}", value)),
            "Status" => continue,
            "TotalTime" => LAUNCH_TOTAL_TIME,
            "WaitTime" => LAUNCH_WAIT_TIME,
            _ => LAUNCH_THIS_TIME,
        };
        let ms: f64 = value
            .parse()
            .ok()
            .filter(|ms: &f64| ms.is_finite())
            .ok_or_else(|| format!("unparsable {} value '{}'", &caps[1], value))?;
        samples.push(MetricSample::new(key, ms, Unit::Ms, Phase::ColdStart));
    }
    Ok(samples)
}

/// Parse the total PSS line of `dumpsys meminfo` (kilobytes) into bytes
pub fn parse_total_pss(stdout: &str) -> Option<MetricSample> {
    let re = TOTAL_PSS_RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*TOTAL(?: PSS)?:?\s+(\d+)").expect("total pss regex is valid")
    });

    let kb: f64 = re.captures(stdout)?[1]
        .parse()
        .ok()
        .filter(|kb: &f64| (kb * 1024.0).is_finite())?;
    Some(MetricSample::new(
        MEMORY_TOTAL_PSS,
        kb * 1024.0,
        Unit::Bytes,
        Phase::SteadyState,
    ))
}

/// Parse `name = value [unit]` / `name: value [unit]` lines printed by a
/// profiler, prefixing keys with the profiler kind. Other lines are ignored.
pub fn parse_profiler_metrics(kind: ProfilerKind, stdout: &str) -> Vec<MetricSample> {
    let re = PROFILER_LINE_RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z][\w.\-]*)\s*[=:]\s*(-?\d+(?:\.\d+)?)\s*(ms|bytes|count)?\s*$")
            .expect("profiler metric regex is valid")
    });

    stdout
        .lines()
        .filter_map(|line| re.captures(line))
        .filter_map(|caps| {
            let value: f64 = caps[2].parse().ok()?;
            if !value.is_finite() {
                log::warn!("Ignoring out-of-range profiler value for {}", &caps[1]);
                return None;
            }
            let unit = caps
                .get(3)
                .and_then(|m| Unit::parse(m.as_str()))
                .unwrap_or(Unit::Count);
            Some(MetricSample::new(
                format!("{}.{}", kind.as_str(), &caps[1]),
                value,
                unit,
                Phase::SteadyState,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const AM_START_OUTPUT: &str = "\
Starting: Intent { cmp=com.example.app/.MainActivity }
Status: ok
LaunchState: COLD
Activity: com.example.app/.MainActivity
TotalTime: 512
WaitTime: 530
Complete
";

    #[test]
    fn test_parse_launch_output_extracts_timings() {
        let samples = parse_launch_output(AM_START_OUTPUT).unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].key, LAUNCH_TOTAL_TIME);
        assert_eq!(samples[0].value, 512.0);
        assert_eq!(samples[0].phase, Phase::ColdStart);
        assert_eq!(samples[1].key, LAUNCH_WAIT_TIME);
    }

    #[test]
    fn test_parse_launch_output_rejects_error_line() {
        let output = "Starting: Intent { cmp=com.example.app/.Missing }\n\
                      Error type 3\n\
                      Error: Activity class {com.example.app/.Missing} does not exist.\n";

        let err = parse_launch_output(output).unwrap_err();
        assert!(err.contains("does not exist"));
    }

    #[test]
    fn test_parse_launch_output_rejects_non_ok_status() {
        let err = parse_launch_output("Status: timeout\n").unwrap_err();
        assert_eq!(err, "launch status: timeout");
    }

    #[test]
    fn test_parse_launch_output_rejects_non_finite_values() {
        for value in ["NaN", "inf", "-infinity"] {
            let err = parse_launch_output(&format!("TotalTime: {}\n", value)).unwrap_err();
            assert!(err.contains("unparsable TotalTime"), "{}", err);
        }
    }

    #[test]
    fn test_parse_launch_output_without_timings_is_empty() {
        assert!(parse_launch_output("launched\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_total_pss_classic_layout() {
        let output = "\
                   Pss  Private  Private  SwapPss
                 Total    Dirty    Clean    Dirty
                ------   ------   ------   ------
  Native Heap    10240     10200        0        0
        TOTAL    45678     40000     2000        0
";
        let sample = parse_total_pss(output).unwrap();
        assert_eq!(sample.key, MEMORY_TOTAL_PSS);
        assert_eq!(sample.value, 45678.0 * 1024.0);
        assert_eq!(sample.unit, Unit::Bytes);
    }

    #[test]
    fn test_parse_total_pss_summary_layout() {
        let output = "App Summary\n   TOTAL PSS:    51200            TOTAL RSS:   90000\n";
        assert_eq!(parse_total_pss(output).unwrap().value, 51200.0 * 1024.0);
    }

    #[test]
    fn test_parse_total_pss_missing() {
        assert!(parse_total_pss("No process found for: com.example.app\n").is_none());
    }

    #[test]
    fn test_parse_total_pss_rejects_overflowing_value() {
        let output = format!("        TOTAL    {}\n", "9".repeat(400));
        assert!(parse_total_pss(&output).is_none());
    }

    #[test]
    fn test_parse_profiler_metrics_skips_overflowing_values() {
        let output = format!("gc.count = 3\nalloc.bytes = {}\n", "9".repeat(400));
        let samples = parse_profiler_metrics(ProfilerKind::Native, &output);

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].key, "native.gc.count");
    }

    #[test]
    fn test_parse_profiler_metrics_prefixes_keys_and_reads_units() {
        let output = "\
collecting...
gc.count = 4
gc.pause-time: 12.5 ms
alloc.bytes = 1048576 bytes
not a metric line
";
        let samples = parse_profiler_metrics(ProfilerKind::Managed, output);

        let keys: Vec<_> = samples.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["managed.gc.count", "managed.gc.pause-time", "managed.alloc.bytes"]
        );
        assert_eq!(samples[0].unit, Unit::Count);
        assert_eq!(samples[1].unit, Unit::Ms);
        assert_eq!(samples[1].value, 12.5);
        assert_eq!(samples[2].unit, Unit::Bytes);
    }

    #[test]
    fn test_duration_sample_is_in_milliseconds() {
        let sample = duration_sample(BUILD_DURATION, Phase::Build, Duration::from_millis(1500));
        assert_eq!(sample.value, 1500.0);
        assert_eq!(sample.unit, Unit::Ms);
    }
}
