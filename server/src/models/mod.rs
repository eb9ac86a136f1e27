pub mod customer;
pub mod event;
pub mod ticket;

pub use customer::{Customer, CustomerId};
pub use event::{Event, EventDraft, EventId, EventView};
pub use ticket::{CustomerTicket, NewTicket, Ticket, TicketId};
