//! Ctrl-C handling.

use keel_core::CancelFlag;
use tracing::{debug, warn};

/// Exit status after a forced second interrupt (128 + SIGINT).
const FORCED_EXIT: i32 = 130;

/// Sets `cancel` on the first Ctrl-C and exits on the second.
///
/// The handler runs on its own thread with a single-threaded runtime; the
/// release itself stays synchronous and polls the flag between steps.
pub fn install(cancel: CancelFlag) {
    let spawned = std::thread::Builder::new()
        .name("keel-signal".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!(error = %e, "could not start signal runtime");
                    return;
                }
            };

            runtime.block_on(async {
                loop {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!(error = %e, "could not listen for Ctrl-C");
                        return;
                    }
                    if cancel.cancel() {
                        eprintln!(
                            "\nSecond interrupt: exiting now. The backup directory is left in place."
                        );
                        std::process::exit(FORCED_EXIT);
                    }
                    eprintln!(
                        "\nInterrupt received: stopping after the current step (press Ctrl-C again to force)."
                    );
                }
            });
        });

    match spawned {
        Ok(_) => debug!("installed Ctrl-C handler"),
        Err(e) => warn!(error = %e, "could not install Ctrl-C handler"),
    }
}
