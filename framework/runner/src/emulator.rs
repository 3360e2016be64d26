use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use cc_tunnel_core::prelude::{ConfigError, LinkDirections, LinkEmulation};

/// Environment variable to override the path to the `mm-link` link emulator.
pub const MM_LINK_PATH_ENV: &str = "CC_TUNNEL_MM_LINK_PATH";

/// Get the path to the link emulator binary.
///
/// If the [`MM_LINK_PATH_ENV`] environment variable is set, its value is used as the path to
/// the emulator. If it is not set, `mm-link` is looked up in the system's PATH.
pub fn mm_link_path() -> Result<PathBuf, ConfigError> {
    match env::var(MM_LINK_PATH_ENV).ok().as_deref() {
        Some("") => Err(ConfigError::EmulatorNotFound(format!(
            "'{MM_LINK_PATH_ENV}' set to empty string"
        ))),
        Some("mm-link") | None => {
            log::debug!("'{MM_LINK_PATH_ENV}' is not a path so looking in user's 'PATH'");
            which::which("mm-link").map_err(|_| {
                ConfigError::EmulatorNotFound(format!(
                    "mm-link not found in PATH. Please install mahimahi or set '{MM_LINK_PATH_ENV}' to the correct path."
                ))
            })
        }
        Some(path) => {
            let mm_link_path = PathBuf::from(path);
            if !mm_link_path.exists() {
                return Err(ConfigError::EmulatorNotFound(format!(
                    "path overwritten with '{MM_LINK_PATH_ENV}={path}' but that path doesn't exist"
                )));
            }
            Ok(mm_link_path)
        }
    }
}

/// Build the emulator command line that the second endpoint is started under.
///
/// The layout is `<prepend...> <mm-link> <uplink trace> <downlink trace> --uplink-log=<..>
/// --downlink-log=<..> <extra...> <append...>`. The caller adds `--` and the endpoint.
pub fn emulator_argv(
    mm_link: &Path,
    emulation: &LinkEmulation,
    directions: &LinkDirections,
) -> Vec<OsString> {
    let mut argv: Vec<OsString> = emulation.prepend.iter().map(OsString::from).collect();

    argv.push(mm_link.as_os_str().to_owned());
    argv.push(directions.uplink_trace.as_os_str().to_owned());
    argv.push(directions.downlink_trace.as_os_str().to_owned());
    argv.push(prefixed("--uplink-log=", &directions.uplink_log));
    argv.push(prefixed("--downlink-log=", &directions.downlink_log));

    argv.extend(emulation.extra_link_args.iter().map(OsString::from));
    argv.extend(emulation.append.iter().map(OsString::from));
    argv
}

fn prefixed(prefix: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(prefix);
    arg.push(path.as_os_str());
    arg
}
