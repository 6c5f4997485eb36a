mod session;
mod state;

pub use session::{App, FetchDisposition, LoadStatus, RequestTicket};
pub use state::{FilterState, Filters};
