use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayerId(u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Players currently connected to the count server.
#[derive(Debug, Default)]
pub struct Lobby {
    players: BTreeSet<PlayerId>,
}

impl Lobby {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a player under the lowest free id and returns the new count.
    pub fn join(&mut self) -> (PlayerId, usize) {
        let id = (0..=u32::MAX)
            .map(PlayerId)
            .find(|id| !self.players.contains(id))
            .unwrap_or(PlayerId(u32::MAX));
        self.players.insert(id);
        (id, self.players.len())
    }

    /// Returns the new count, or `None` if the player was not here.
    pub fn leave(&mut self, id: PlayerId) -> Option<usize> {
        self.players.remove(&id).then(|| self.players.len())
    }

    pub fn count(&self) -> usize {
        self.players.len()
    }
}
