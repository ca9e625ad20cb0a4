//! Small helpers shared by the master and worker binaries.

/// Prints a diagnostic and terminates the process.
///
/// Filesystem and input errors are fatal by design (see the Intermediate
/// Store error taxonomy): there is no recovery path for a split that can't
/// be read or an intermediate file that can't be created.
pub fn fatal(msg: impl std::fmt::Display) -> ! {
    eprintln!("fatal: {}", msg);
    std::process::exit(1);
}
