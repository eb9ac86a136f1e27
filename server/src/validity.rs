//! Schedule predicates shared by the event catalog and checkout.

use chrono::{DateTime, Utc};

use crate::models::Event;

/// An event has started once `now` reaches its initial date. Started events
/// no longer sell tickets.
pub fn has_started(event: &Event, now: DateTime<Utc>) -> bool {
    now >= event.initial_date
}

/// An event has finished once `now` reaches its final date. Finished events
/// can be neither edited nor deleted.
pub fn has_finished(event: &Event, now: DateTime<Utc>) -> bool {
    now >= event.final_date
}
