//! hk watch: stream change notices from other contexts.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::bus::{ChangeNotice, Origin};
use crate::cli::{load_context, GlobalOptions};
use crate::error::Result;
use crate::keys::Channel;
use crate::output::emit_event;

const WAIT_SLICE: Duration = Duration::from_millis(200);

pub struct WatchOptions {
    pub channels: Vec<String>,
    pub count: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub global: GlobalOptions,
}

fn parse_channels(raw: &[String]) -> Result<Vec<Channel>> {
    if raw.is_empty() {
        return Ok(Channel::ALL.to_vec());
    }
    raw.iter().map(|name| name.parse()).collect()
}

pub fn run(options: WatchOptions) -> Result<()> {
    let channels = parse_channels(&options.channels)?;
    let ctx = load_context(&options.global)?;
    let bus = ctx.bus();
    let output = options.global.output();

    let (tx, rx) = mpsc::channel::<ChangeNotice>();
    let subscription = bus.subscribe(&channels, move |notice| {
        let _ = tx.send(notice.clone());
    });
    tracing::debug!(channels = channels.len(), "watching store");

    let deadline = options
        .timeout_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));
    let mut seen = 0usize;

    'watch: loop {
        let slice = match deadline {
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    break;
                }
                left.min(WAIT_SLICE)
            }
            None => WAIT_SLICE,
        };
        let started = Instant::now();
        if bus.wait(slice) == 0 {
            // No feed or a dead one returns at once.
            std::thread::sleep(slice.saturating_sub(started.elapsed()));
        }

        for notice in rx.try_iter() {
            let origin = match notice.origin {
                Origin::Local => "local",
                Origin::Remote => "remote",
            };
            let line = format!("{} {} ({origin})", notice.channel, notice.key);
            emit_event(output, &notice, &line)?;
            seen += 1;
            if options.count.is_some_and(|count| seen >= count) {
                break 'watch;
            }
        }
    }

    bus.unsubscribe(subscription);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_channels_means_all() {
        assert_eq!(parse_channels(&[]).expect("parse"), Channel::ALL.to_vec());
    }

    #[test]
    fn unknown_channel_is_rejected() {
        let err = parse_channels(&["tasks".to_string(), "laundry".to_string()])
            .expect_err("unknown channel");
        assert_eq!(err.exit_code(), 2);
    }
}
