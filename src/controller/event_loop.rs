//! The watch loop.
//!
//! One task owns the controller and waits on three things at once: the
//! refresh interval, user actions from the input channel, and whichever
//! in-flight request finishes next. Requests are never serialized or
//! cancelled; each is rendered (or discarded) as it resolves.

use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::MissedTickBehavior;

use super::DashboardController;
use crate::filter::FilterCriteria;

/// Something the user asked for while the dashboard is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    Filter(FilterCriteria),
    Reset,
    Refresh,
    Quit,
}

/// Drive `controller` until `Quit` arrives or the action channel closes.
///
/// The first refresh is issued immediately. Requests still in flight when
/// the loop exits are dropped.
pub async fn run(
    controller: &mut DashboardController,
    mut actions: UnboundedReceiver<UserAction>,
    every: Duration,
) {
    controller.start();

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut pending = FuturesUnordered::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => pending.push(controller.begin_refresh()),
            action = actions.recv() => match action {
                Some(UserAction::Filter(criteria)) => pending.push(controller.begin_filter(&criteria)),
                Some(UserAction::Reset) => pending.push(controller.begin_reset()),
                Some(UserAction::Refresh) => pending.push(controller.begin_refresh()),
                Some(UserAction::Quit) | None => break,
            },
            Some(outcome) = pending.next(), if !pending.is_empty() => controller.complete(outcome),
        }
    }

    if !pending.is_empty() {
        tracing::debug!(in_flight = pending.len(), "dropping in-flight requests");
    }
    controller.shutdown();
}
