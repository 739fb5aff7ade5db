//! SNTP bridge into the network time mailbox.
//!
//! ESP-IDF runs the SNTP client on the lwIP task and reports each
//! completed synchronisation as a `Duration` since the Unix epoch.  The
//! callback converts it to UTC and posts it to [`NETWORK_TIME`]; all
//! validation happens later in the time base.
//!
//! [`NETWORK_TIME`]: crate::clock::network::NETWORK_TIME

use core::time::Duration;

use chrono::{DateTime, NaiveDateTime};

use crate::clock::network::NetworkClock;

/// Unix-epoch duration → UTC.  `None` past the calendar range.
pub fn utc_from_unix(since_epoch: Duration) -> Option<NaiveDateTime> {
    let secs = i64::try_from(since_epoch.as_secs()).ok()?;
    DateTime::from_timestamp(secs, since_epoch.subsec_nanos()).map(|dt| dt.naive_utc())
}

/// Forward one SNTP completion into `mailbox`.
pub fn deliver(mailbox: &NetworkClock, since_epoch: Duration) {
    match utc_from_unix(since_epoch) {
        Some(utc) => mailbox.deliver(utc),
        None => log::warn!("SNTP: unrepresentable time {:?} ignored", since_epoch),
    }
}

/// Start the SNTP client with the default pool servers.  The returned
/// handle must be kept alive for updates to keep arriving.
#[cfg(target_os = "espidf")]
pub fn start(
    mailbox: &'static NetworkClock,
) -> Result<esp_idf_svc::sntp::EspSntp<'static>, esp_idf_svc::sys::EspError> {
    use esp_idf_svc::sntp::{EspSntp, SntpConf};

    let sntp = EspSntp::new_with_callback(&SntpConf::default(), move |since_epoch| {
        deliver(mailbox, since_epoch);
    })?;
    log::info!("SNTP: client started");
    Ok(sntp)
}
