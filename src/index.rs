use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::fingerprinter::Configuration;
use crate::hashing::Fingerprint;

/// Identifier of a song in a corpus.
pub type SongId = u32;

/// A stored fingerprint seen from the lookup side: who owns it and when it occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Posting {
    pub song_id: SongId,
    pub anchor_time: u32,
}

/// Append-only mapping from fingerprint hashes to the songs that contain them.
pub trait FingerprintIndex {
    /// Returns the parameters the corpus was built with, if any were stored.
    fn parameters(&self) -> Result<Option<Configuration>>;

    /// Unconditionally records the corpus parameters.
    fn insert_parameters(&mut self, config: &Configuration) -> Result<()>;

    /// Records the corpus parameters on first use; afterwards only checks that they match.
    fn store_parameters(&mut self, config: &Configuration) -> Result<()> {
        config.validate()?;
        match self.parameters()? {
            Some(stored) => stored.ensure_compatible(config),
            None => self.insert_parameters(config),
        }
    }

    /// Registers a new song and returns its freshly allocated id.
    ///
    /// Ids are never reused, even across sessions on a persistent index.
    /// Fails with [`Error::DuplicateSong`] when the name is taken.
    fn add_song(&mut self, name: &str) -> Result<SongId>;

    /// Appends all fingerprints of a song.
    fn put(&mut self, song_id: SongId, fingerprints: &[Fingerprint]) -> Result<()>;

    /// Registers a song together with all of its fingerprints.
    ///
    /// Either both are stored or neither is, so an interrupted build never
    /// leaves a song without fingerprints behind.
    fn add_song_with_fingerprints(&mut self, name: &str, fingerprints: &[Fingerprint]) -> Result<SongId>;

    /// Returns every stored posting with exactly this hash.
    fn lookup(&self, hash: u32) -> Result<Vec<Posting>>;

    /// Looks up many hashes at once. Hashes without postings are absent from the map.
    fn lookup_many(&self, hashes: &[u32]) -> Result<HashMap<u32, Vec<Posting>>> {
        let mut postings = HashMap::new();
        for &hash in hashes {
            if postings.contains_key(&hash) {
                continue;
            }
            let found = self.lookup(hash)?;
            if !found.is_empty() {
                postings.insert(hash, found);
            }
        }
        Ok(postings)
    }

    /// Resolves a song id to its name.
    fn get_name(&self, song_id: SongId) -> Result<String>;

    /// Finds a song by name.
    fn song_by_name(&self, name: &str) -> Result<Option<SongId>>;
}

/// An index kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    parameters: Option<Configuration>,
    songs: Vec<String>,
    postings: HashMap<u32, Vec<Posting>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn song_count(&self) -> usize {
        self.songs.len()
    }

    pub fn fingerprint_count(&self) -> usize {
        self.postings.values().map(Vec::len).sum()
    }
}

impl FingerprintIndex for MemoryIndex {
    fn parameters(&self) -> Result<Option<Configuration>> {
        Ok(self.parameters)
    }

    fn insert_parameters(&mut self, config: &Configuration) -> Result<()> {
        self.parameters = Some(*config);
        Ok(())
    }

    fn add_song(&mut self, name: &str) -> Result<SongId> {
        if self.songs.iter().any(|n| n == name) {
            return Err(Error::DuplicateSong(name.to_owned()));
        }
        let song_id = self.songs.len() as SongId;
        self.songs.push(name.to_owned());
        Ok(song_id)
    }

    fn put(&mut self, song_id: SongId, fingerprints: &[Fingerprint]) -> Result<()> {
        if song_id as usize >= self.songs.len() {
            return Err(Error::UnknownSong(song_id));
        }
        for fingerprint in fingerprints {
            self.postings.entry(fingerprint.hash).or_default().push(Posting {
                song_id,
                anchor_time: fingerprint.anchor_time,
            });
        }
        Ok(())
    }

    fn add_song_with_fingerprints(&mut self, name: &str, fingerprints: &[Fingerprint]) -> Result<SongId> {
        // Neither step can fail once the name is known to be free.
        let song_id = self.add_song(name)?;
        self.put(song_id, fingerprints)?;
        Ok(song_id)
    }

    fn lookup(&self, hash: u32) -> Result<Vec<Posting>> {
        Ok(self.postings.get(&hash).cloned().unwrap_or_default())
    }

    fn get_name(&self, song_id: SongId) -> Result<String> {
        self.songs
            .get(song_id as usize)
            .cloned()
            .ok_or(Error::UnknownSong(song_id))
    }

    fn song_by_name(&self, name: &str) -> Result<Option<SongId>> {
        Ok(self.songs.iter().position(|n| n == name).map(|i| i as SongId))
    }
}
