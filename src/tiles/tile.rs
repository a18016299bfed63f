//! Tile record and its load lifecycle
//!
//! ```text
//! Initial ──request──▶ Loading ──success──▶ Ready
//!    ▲                    │                   │
//!    └──────failure───────┘                   │
//! Initial / Loading / Ready ──evict──▶ Cancelled (terminal)
//! ```

use crate::{
    core::geo::TileId,
    traits::RetryLogic,
    CoverageError, Result,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileState {
    /// Required but no load in flight
    Initial,
    /// A load request was dispatched and has not answered yet
    Loading,
    /// Content is available for rendering
    Ready,
    /// Evicted from the cache; never reused
    Cancelled,
}

/// One cached tile. Owned by the [`crate::CoverageEngine`] cache.
#[derive(Debug)]
pub struct Tile {
    id: TileId,
    state: TileState,
    /// Token of the in-flight request while `Loading`
    token: Option<u64>,
    payload: Option<Vec<u8>>,
    failures: u32,
    last_failure: Option<Instant>,
}

impl Tile {
    pub fn new(id: TileId) -> Self {
        Self {
            id,
            state: TileState::Initial,
            token: None,
            payload: None,
            failures: 0,
            last_failure: None,
        }
    }

    pub fn id(&self) -> TileId {
        self.id
    }

    pub fn state(&self) -> TileState {
        self.state
    }

    pub fn token(&self) -> Option<u64> {
        self.token
    }

    /// Decoded content, present only while `Ready`
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn is_ready(&self) -> bool {
        self.state == TileState::Ready
    }

    /// True if `token` identifies the request this tile is waiting for
    pub fn is_awaiting(&self, token: u64) -> bool {
        self.state == TileState::Loading && self.token == Some(token)
    }

    /// `Initial → Loading`, remembering the request token
    pub fn begin_loading(&mut self, token: u64) -> Result<()> {
        self.expect_state(&[TileState::Initial], TileState::Loading)?;
        self.state = TileState::Loading;
        self.token = Some(token);
        Ok(())
    }

    /// `Loading → Ready`, storing the decoded content
    pub fn complete(&mut self, payload: Vec<u8>) -> Result<()> {
        self.expect_state(&[TileState::Loading], TileState::Ready)?;
        self.state = TileState::Ready;
        self.token = None;
        self.payload = Some(payload);
        self.failures = 0;
        self.last_failure = None;
        Ok(())
    }

    /// `Loading → Initial`, recording the failure for the retry policy
    pub fn fail(&mut self) -> Result<()> {
        self.expect_state(&[TileState::Loading], TileState::Initial)?;
        self.state = TileState::Initial;
        self.token = None;
        self.failures += 1;
        self.last_failure = Some(Instant::now());
        Ok(())
    }

    /// Any live state `→ Cancelled`, dropping content. Returns the previous state.
    pub fn cancel(&mut self) -> Result<TileState> {
        self.expect_state(
            &[TileState::Initial, TileState::Loading, TileState::Ready],
            TileState::Cancelled,
        )?;
        let previous = self.state;
        self.state = TileState::Cancelled;
        self.token = None;
        self.payload = None;
        Ok(previous)
    }

    fn expect_state(&self, allowed: &[TileState], to: TileState) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(CoverageError::InvalidTransition {
                id: self.id,
                from: self.state,
                to,
            }
            .into())
        }
    }
}

impl RetryLogic for Tile {
    fn get_retry_count(&self) -> u32 {
        self.failures
    }

    fn get_last_retry_time(&self) -> Option<Instant> {
        self.last_failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RetryConfig;

    fn tile() -> Tile {
        Tile::new(TileId::new(1, 2, 3))
    }

    #[test]
    fn test_happy_path() {
        let mut tile = tile();
        assert_eq!(tile.state(), TileState::Initial);

        tile.begin_loading(7).unwrap();
        assert_eq!(tile.state(), TileState::Loading);
        assert!(tile.is_awaiting(7));
        assert!(!tile.is_awaiting(8));

        tile.complete(vec![1, 2, 3]).unwrap();
        assert!(tile.is_ready());
        assert_eq!(tile.payload(), Some(&[1, 2, 3][..]));
        assert_eq!(tile.token(), None);

        assert_eq!(tile.cancel().unwrap(), TileState::Ready);
        assert_eq!(tile.state(), TileState::Cancelled);
        assert_eq!(tile.payload(), None);
    }

    #[test]
    fn test_failure_returns_to_initial() {
        let mut tile = tile();
        tile.begin_loading(1).unwrap();
        tile.fail().unwrap();

        assert_eq!(tile.state(), TileState::Initial);
        assert_eq!(tile.failures(), 1);
        assert!(tile.should_retry(&RetryConfig::immediate(1)));
        assert!(!tile.should_retry(&RetryConfig::immediate(0)));
        assert!(!tile.retries_exhausted(&RetryConfig::immediate(1)));
        assert!(tile.retries_exhausted(&RetryConfig::immediate(0)));

        tile.begin_loading(2).unwrap();
        tile.complete(Vec::new()).unwrap();
        assert_eq!(tile.failures(), 0);
    }

    #[test]
    fn test_invalid_transitions_leave_tile_untouched() {
        let mut tile = tile();
        assert!(tile.complete(vec![0]).is_err());
        assert!(tile.fail().is_err());
        assert_eq!(tile.state(), TileState::Initial);

        tile.begin_loading(1).unwrap();
        assert!(tile.begin_loading(2).is_err());
        assert!(tile.is_awaiting(1));

        tile.cancel().unwrap();
        assert!(tile.cancel().is_err());
        assert!(tile.begin_loading(3).is_err());
        assert_eq!(tile.state(), TileState::Cancelled);
    }

    #[test]
    fn test_transition_error_kind() {
        let mut tile = tile();
        let err = tile.complete(vec![0]).unwrap_err();

        match err.downcast_ref::<CoverageError>() {
            Some(CoverageError::InvalidTransition { from, to, .. }) => {
                assert_eq!(*from, TileState::Initial);
                assert_eq!(*to, TileState::Ready);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
