//! INI serialization: `ConfigFile` -> commented INI string.

use super::duration::format_duration;
use super::file::ConfigFile;

/// Convert a `ConfigFile` to the commented INI text written to `config.ini`.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let tracking = &config.tracking;

    format!(
        r#"[tracking]
; Desired update interval, also the watchdog poll period (default: 10s)
; Supports: ms, s, m suffixes (e.g., 500ms, 10s, 2m)
interval = {}
; Minimum distance between updates in meters (default: 10)
min_distance = {}
; Accuracy tier:
;   high_accuracy - GPS-grade fixes (default)
;   balanced      - block-level accuracy, lower power
;   low_power     - city-level accuracy
accuracy = {}
; Hold the first update until an accurate fix is available (default: true)
wait_for_accurate = {}
; Granularity of delivered positions:
;   permission_level - follow the granted permission (default)
;   coarse           - approximate positions only
;   fine             - precise positions
granularity = {}

[logging]
; Directory for the session log (default: ~/.geotrack/logs)
directory = {}
; Log file name, cleared at the start of each session
file = {}
"#,
        format_duration(tracking.interval),
        tracking.min_distance_meters,
        tracking.accuracy,
        tracking.wait_for_accurate_fix,
        tracking.granularity,
        config.logging.directory.display(),
        config.logging.file,
    )
}
