//! HTTP handlers for the answer service.

pub mod answer;
