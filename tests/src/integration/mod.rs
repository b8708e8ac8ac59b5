//! Integration flows.

#[cfg(test)]
mod harness;

#[cfg(test)]
mod issuance_flow;

#[cfg(test)]
mod agency_flow;
