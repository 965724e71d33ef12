//! Bid schedule estimating for public works RFPs.
//!
//! Each bid schedule row gets a bid item whose material, labor and equipment
//! lines roll up into a cost and a sale price. Totals are recomputed on
//! request and written back in a single transaction.

pub mod calculators;
pub mod models;
pub mod queries;
pub mod requests;
pub mod responses;
pub mod routes;
pub mod services;

pub use calculators::{calculate_totals, BidItemTotals};
pub use routes::router;
pub use services::BidError;
