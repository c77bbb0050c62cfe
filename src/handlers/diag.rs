//! Diagnostic Collector: RSI and log collection jobs.
//!
//! Standard mode generates a Request Support Information dump, archives
//! `/var/log`, and uploads the archive to the FTP server. Extensive mode
//! additionally runs a fixed battery of forwarding-plane and memory
//! introspection commands, one output file each, before archiving.
//! Mid-sequence failures are terminal: a silent partial bundle is worse
//! than an explicit failure, so nothing is retried.

use chrono::Local;
use tracing::{info, warn};

use crate::config::FtpConfig;
use crate::credentials::CredentialKind;
use crate::errors::{OpsError, OpsResult};
use crate::handlers::{connect_or_report, notify, report_failure, Capabilities};
use crate::netconf::failures::{classify_remote_failure, sanitize_remote_error, RemoteFailure};
use crate::netconf::{DeviceSession, DEFAULT_COMMAND_TIMEOUT, RSI_TIMEOUT};

/// Scratch directory on the device for per-command output files.
const EXTENSIVE_DIR: &str = "/var/log/extensive";

/// The fixed command battery for extensive collection. Ordering matters to
/// support engineers reading the bundle; duplicated entries are deliberate
/// (the same counters are sampled again after the memory walks).
pub const EXTENSIVE_COMMANDS: &[&str] = &[
    "request pfe execute command \"show arena\" target fwdd",
    "show system storage",
    "show system virtual-memory",
    "show system processes extensive",
    "show security idp memory",
    "show chassis routing-engine",
    "show system processes extensive",
    "show services application-identification counter",
    "show security idp counters ips",
    "show security idp counters memory",
    "show security idp counters packet",
    "show security idp counters flow",
    "show security idp counters tcp-reassembler",
    "show security idp application-statistics",
    "show security flow session summary",
    "show security resource-manager summary",
    "show security resource-manager resource active",
    "show security resource-manager group active",
    "show services application-identification counter",
    "show services application-identification statistics applications",
    "request pfe execute command \"show arena\" target fwdd",
    "request pfe execute command \"show memory\" target fwdd",
    "request pfe execute command \"show heap 0\" target fwdd",
    "request pfe execute command \"show heap 1\" target fwdd",
    "request pfe execute command \"show heap\" target fwdd",
    "request pfe execute command \"show heap 0 sanity\" target fwdd",
    "request pfe execute command \"show heap 0 accounting pc\" target fwdd",
    "request pfe execute command \"show heap 0 accounting pc size\" target fwdd",
    "request pfe execute command \"show heap 1 accounting pc size\" target fwdd",
    "request pfe execute command \"show usp memory segment shm control objcache jsf summary\" target fwdd",
    "request pfe execute command \"show usp memory segment shm data objcache jsf summary\" target fwdd",
    "request pfe execute command \"show usp memory segment shm data module\" target fwdd",
    "request pfe execute command \"show usp memory-use all\" target fwdd",
    "request pfe execute command \"show usp memory segment\" target fwdd",
    "request pfe execute command \"show usp memory segment shm\" target fwdd",
    "request pfe execute command \"show usp memory segment shm control module\" target fwdd",
    "request pfe execute command \"show usp memory segment shm control objcache jsf\" target fwdd",
    "request pfe execute command \"show usp memory segment shm data module\" target fwdd",
    "request pfe execute command \"show usp memory segment heap 0\" target fwdd",
    "request pfe execute command \"show usp memory segment shm data objcache service\" target fwdd",
    "request pfe execute command \"show usp memory segment shm data objcache jsf\" target fwdd",
    "request pfe execute command \"show usp memory segment heap modules\" target fwdd",
    "request pfe execute command \"show usp memory segment detail\" target fwdd",
    "request pfe execute command \"show usp idp status\" target fwdd",
    "request pfe execute command \"show usp idp context stats\" target fwdd",
    "request pfe execute command \"show usp idp context hits\" target fwdd",
    "request pfe execute command \"show usp idp memdebug\" target fwdd",
    "request pfe execute command \"show usp idp memory\" target fwdd",
    "request pfe execute command \"show usp idp debug-counter action\" target fwdd",
    "request pfe execute command \"show usp idp debug-counter memory\" target fwdd",
    "request pfe execute command \"show usp algs ftp stats\" target fwdd",
    "request pfe execute command \"show usp asl stats all\" target fwdd",
    "request pfe execute command \"show usp jsf tcp stats\" target fwdd",
    "request pfe execute command \"show usp jsf counters\" target fwdd",
    "request pfe execute command \"show usp jsf counters junos-alg\" target fwdd",
    "request pfe execute command \"show usp jsf flow stats\" target fwdd",
    "request pfe execute command \"show usp jsf jbuf_pool stats\" target fwdd",
    "request pfe execute command \"show usp jsf plugin-list\" target fwdd",
    "request pfe execute command \"show usp jsf plugins\" target fwdd",
    "request pfe execute command \"show usp flow session summary\" target fwdd",
    "request pfe execute command \"show usp flow counters all\" target fwdd",
    "request pfe execute command \"show usp flow stats\" target fwdd",
    "request pfe execute command \"show usp flow counter all\" target fwdd",
    "request pfe execute command \"show usp gate all\" target fwdd",
    "request pfe execute command \"show usp gate statistics\" target fwdd",
    "request pfe execute command \"show usp appfw statistic\" target fwdd",
    "request pfe execute command \"show usp appfw counter\" target fwdd",
    "request pfe execute command \"show usp appid config\" target fwdd",
    "request pfe execute command \"show usp appid thread status\" target fwdd",
    "request pfe execute command \"show usp plugins\" target fwdd",
    "request pfe execute command \"show piles\" target fwdd",
    "request pfe execute command \"show mbuf host\" target fwdd",
    "request pfe execute command \"show mbuf counters\" target fwdd",
    "request pfe execute command \"show service objcache\" target fwdd",
    "request pfe execute command \"plugin jdpi show configuration tunables\" target fwdd",
    "request pfe execute command \"show jsf shm module\" target fwdd",
    "request pfe execute command \"show jsf objcache\" target fwdd",
    "request pfe execute command \"show jsf shm module\" target fwdd",
    "request pfe execute command \"show jsf objcache\" target fwdd",
    "request pfe execute command \"show usp jsf counters\" target fwdd",
    "request pfe execute command \"show usp flow counters all\" target fwdd",
    "request pfe execute command \"show service objcache\" target fwdd",
    "request pfe execute command \"show jsf objcache\" target fwdd",
    "request pfe execute command \"show usp memory segment detail\" target fwdd",
    "request pfe execute command \"show usp memory segment shm data objcache services\" target fwdd",
    "request pfe execute command \"show usp memory segment shm data objcache jsf\" target fwdd",
    "request pfe execute command \"show piles\" target fwdd",
    "request pfe execute command \"show usp jsf jbuf_pool stats\" target fwdd",
    "request pfe execute command \"show usp memory segment shm data module\" target fwdd",
];

/// Upload destination with and without embedded credentials. Only the
/// redacted form is ever shown to an operator.
struct FtpTarget {
    full_url: String,
    redacted_url: String,
}

/// Entry point for one collection job. Owns the session lifecycle: however
/// the collection ends, the session is closed exactly once.
pub async fn run(
    caps: Capabilities,
    ftp: FtpConfig,
    device: String,
    chat_id: String,
    extensive: bool,
) {
    if extensive {
        info!("extensive log collection for {} (20-25 minutes)", device);
        notify(
            &caps,
            &chat_id,
            "Collecting extensive Junos logs. This many logs will take 20-25 minutes to collect",
        )
        .await;
    }

    let Some(mut session) = connect_or_report(&caps, &device, &chat_id).await else {
        return;
    };

    let outcome = if extensive {
        extensive_collection(session.as_mut(), &caps, &ftp, &device, &chat_id).await
    } else {
        standard_collection(session.as_mut(), &caps, &ftp, &device, &chat_id).await
    };
    session.close().await;

    match outcome {
        Ok(archive_url) => {
            info!("log collection for {} complete: {}", device, archive_url);
            notify(
                &caps,
                &chat_id,
                &format!("All done! The logs are here: {}", archive_url),
            )
            .await;
        }
        Err(e) => report_failure(&caps, &chat_id, &device, "log collection", &e).await,
    }
}

/// Generate the RSI, archive `/var/log`, upload. Returns the redacted URL
/// of the uploaded archive.
async fn standard_collection(
    session: &mut dyn DeviceSession,
    caps: &Capabilities,
    ftp: &FtpConfig,
    device: &str,
    chat_id: &str,
) -> OpsResult<String> {
    let date = Local::now().format("%Y-%m-%d");
    let time = Local::now().format("%H%M");
    let rsi_filename = format!("/var/log/RSI-Support-{}-{}-{}.txt", device, date, time);
    let archive = format!("/var/tmp/Support-{}-{}-{}.tgz", device, date, time);

    info!("generating RSI on {}: {}", device, rsi_filename);
    session
        .run(
            &format!("request support information | save {}", rsi_filename),
            RSI_TIMEOUT,
        )
        .await?;
    notify(caps, chat_id, &format!("I've created the RSI: {}", rsi_filename)).await;

    session
        .run(
            &format!(
                "file archive compress source /var/log/* destination {}",
                archive
            ),
            DEFAULT_COMMAND_TIMEOUT,
        )
        .await?;
    notify(caps, chat_id, &format!("I've created the log archive: {}", archive)).await;

    notify(caps, chat_id, "I'm uploading the archive now...").await;
    upload(session, caps, ftp, chat_id, &archive).await
}

/// Standard collection plus the fixed command battery, each command saved
/// to its own file under the scratch directory.
async fn extensive_collection(
    session: &mut dyn DeviceSession,
    caps: &Capabilities,
    ftp: &FtpConfig,
    device: &str,
    chat_id: &str,
) -> OpsResult<String> {
    standard_collection(session, caps, ftp, device, chat_id).await?;

    notify(caps, chat_id, "Now to get all the show commands...").await;

    // Recreate the scratch directory so stale output from an earlier run
    // can't end up in the bundle.
    session
        .run(
            &format!("file delete-directory {} recurse", EXTENSIVE_DIR),
            DEFAULT_COMMAND_TIMEOUT,
        )
        .await?;
    session
        .run(
            &format!("file make-directory {}", EXTENSIVE_DIR),
            DEFAULT_COMMAND_TIMEOUT,
        )
        .await?;

    for command in EXTENSIVE_COMMANDS {
        let filename = format!("{}/{}.txt", EXTENSIVE_DIR, output_filename(command));
        session
            .run(
                &format!("{} | save {}", command, filename),
                DEFAULT_COMMAND_TIMEOUT,
            )
            .await?;
    }

    let date = Local::now().format("%Y-%m-%d");
    let time = Local::now().format("%H%M");
    let archive = format!("/var/tmp/extensive_logs-{}-{}-{}.tgz", device, date, time);
    notify(caps, chat_id, &format!("Archiving logs to {}", archive)).await;
    session
        .run(
            &format!(
                "file archive compress source /var/log/* destination {}",
                archive
            ),
            DEFAULT_COMMAND_TIMEOUT,
        )
        .await?;

    upload(session, caps, ftp, chat_id, &archive).await
}

/// Resolve transfer credentials, build the URL pair, and copy the archive
/// off the device. Returns the redacted URL of the uploaded file.
async fn upload(
    session: &mut dyn DeviceSession,
    caps: &Capabilities,
    ftp: &FtpConfig,
    chat_id: &str,
    archive: &str,
) -> OpsResult<String> {
    let target = ftp_target(caps, ftp).await?;

    info!("uploading {} to {}", archive, target.redacted_url);
    let response = session
        .run(
            &format!("file copy {} {}", archive, target.full_url),
            DEFAULT_COMMAND_TIMEOUT,
        )
        .await?;

    // The device reports transfer problems as prose in an otherwise
    // successful command ("Not logged in", "could not fetch local copy").
    if response.to_lowercase().contains("not") {
        return Err(transfer_error(&response));
    }

    let filename = archive.rsplit('/').next().unwrap_or(archive);
    Ok(format!("{}{}", target.redacted_url, filename))
}

async fn ftp_target(caps: &Capabilities, ftp: &FtpConfig) -> OpsResult<FtpTarget> {
    if ftp.server.is_empty() || ftp.directory.is_empty() {
        return Err(OpsError::Internal(anyhow::anyhow!(
            "FTP server details are not configured"
        )));
    }

    let secret = caps
        .credentials
        .resolve(CredentialKind::Server, &ftp.server)
        .await?
        .ok_or_else(|| OpsError::CredentialUnavailable(ftp.server.clone()))?;

    Ok(FtpTarget {
        full_url: format!(
            "ftp://{}:{}@{}/{}/",
            secret.username, secret.password, ftp.server, ftp.directory
        ),
        redacted_url: format!("ftp://{}/{}/", ftp.server, ftp.directory),
    })
}

fn transfer_error(response: &str) -> OpsError {
    match classify_remote_failure(response) {
        RemoteFailure::TransferAuth => OpsError::RemoteCommand(
            "the FTP server rejected the login - the transfer credentials look wrong".to_string(),
        ),
        RemoteFailure::ArchiveMissing => OpsError::RemoteCommand(
            "I can't find the archive file to upload to FTP".to_string(),
        ),
        _ => {
            warn!("unrecognised transfer response: {}", response);
            OpsError::RemoteCommand(sanitize_remote_error(response))
        }
    }
}

/// Turn a command into a filename: quotes dropped, spaces to underscores.
fn output_filename(command: &str) -> String {
    command.replace('"', "").replace(' ', "_")
}
