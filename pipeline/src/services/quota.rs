use crate::error::{PipelineError, Result};
use log::debug;

/// Quota units charged by the platform per call.
pub const SEARCH_COST: u32 = 100;
pub const VIDEOS_LIST_COST: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Search,
    Videos,
}

impl Endpoint {
    pub fn cost(self) -> u32 {
        match self {
            Endpoint::Search => SEARCH_COST,
            Endpoint::Videos => VIDEOS_LIST_COST,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Search => "search",
            Endpoint::Videos => "videos",
        }
    }
}

/// Request budget for one collection run. Units are charged before a request
/// is sent, so `used()` never exceeds `limit()`.
#[derive(Debug, Clone)]
pub struct QuotaBudget {
    limit: u32,
    used: u32,
    requests: u32,
}

impl QuotaBudget {
    pub fn new(limit: u32) -> Self {
        QuotaBudget {
            limit,
            used: 0,
            requests: 0,
        }
    }

    pub fn charge(&mut self, endpoint: Endpoint) -> Result<()> {
        let cost = endpoint.cost();
        let remaining = self.remaining();
        if cost > remaining {
            return Err(PipelineError::QuotaExhausted {
                needed: cost,
                remaining,
            });
        }

        self.used += cost;
        self.requests += 1;
        debug!(
            "Charged {cost} unit(s) for {}, {}/{} used",
            endpoint.name(),
            self.used,
            self.limit
        );
        Ok(())
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn remaining(&self) -> u32 {
        self.limit - self.used
    }

    pub fn requests(&self) -> u32 {
        self.requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_requests_it_cannot_cover() {
        let mut budget = QuotaBudget::new(201);
        budget.charge(Endpoint::Search).unwrap();
        budget.charge(Endpoint::Search).unwrap();
        assert_eq!(budget.remaining(), 1);

        let err = budget.charge(Endpoint::Search).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::QuotaExhausted {
                needed: 100,
                remaining: 1
            }
        ));

        budget.charge(Endpoint::Videos).unwrap();
        assert!(budget.charge(Endpoint::Videos).is_err());
        assert_eq!(budget.used(), 201);
        assert_eq!(budget.requests(), 3);
    }
}
