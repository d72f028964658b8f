use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{Result, WinkError};
use crate::io::text::{format_f64_series, read_f64_series};
use crate::signal::{Channel, Recording, Spectrum};

const TIMES_FILE: &str = "times.txt";
const LIGHT_FILES: [&str; 2] = ["light1.txt", "light2.txt"];
const FREQS_FILE: &str = "freqs.txt";
const SPECTRUM_FILES: [&str; 2] = ["light1_spectrum.txt", "light2_spectrum.txt"];
const SAMPLES_MANIFEST: &str = "samples.json";
const SPECTRA_MANIFEST: &str = "spectra.json";

/// Written after the sample arrays; a reader that finds arrays disagreeing with
/// it has raced a writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct SamplesManifest {
    samples: usize,
    fingerprint: u64,
}

/// Identifies which recording, and which slice of it, a cached spectrum was
/// computed from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectraManifest {
    pub samples: usize,
    pub max_duration: Option<f64>,
    pub fingerprint: u64,
}

impl SpectraManifest {
    pub fn for_recording(recording: &Recording, max_duration: Option<f64>) -> Self {
        Self {
            samples: recording.len(),
            max_duration,
            fingerprint: recording.fingerprint(),
        }
    }
}

/// On-disk arrays under one directory.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
}

impl Cache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn sample_paths(&self) -> [PathBuf; 3] {
        [
            self.dir.join(TIMES_FILE),
            self.dir.join(LIGHT_FILES[0]),
            self.dir.join(LIGHT_FILES[1]),
        ]
    }

    /// True when all sample arrays are present.
    pub fn has_samples(&self) -> bool {
        self.sample_paths().iter().all(|p| p.is_file())
    }

    pub fn read_samples(&self) -> Result<Recording> {
        let [times, light1, light2] = self.sample_paths();
        debug!("reading sample cache from {}", self.dir.display());
        let manifest: Option<SamplesManifest> = self.read_manifest(SAMPLES_MANIFEST)?;
        let recording = Recording::new(
            read_f64_series(&times)?,
            read_f64_series(&light1)?,
            read_f64_series(&light2)?,
        )?;
        match manifest {
            Some(m) if m.samples != recording.len() || m.fingerprint != recording.fingerprint() => {
                Err(WinkError::MalformedData(format!(
                    "sample arrays in {} do not match {SAMPLES_MANIFEST} (rewritten while reading?)",
                    self.dir.display()
                )))
            }
            Some(_) => Ok(recording),
            None => {
                debug!("{} has no {SAMPLES_MANIFEST}", self.dir.display());
                Ok(recording)
            }
        }
    }

    /// Replace the sample arrays. Spectra derived from the previous samples are
    /// dropped first, and the samples manifest is written last.
    pub fn write_samples(&self, recording: &Recording) -> Result<()> {
        recording.validate()?;
        self.ensure_dir()?;
        self.remove_if_present(SPECTRA_MANIFEST)?;
        let [times, light1, light2] = self.sample_paths();
        write_atomic(&times, format_f64_series(&recording.times).as_bytes())?;
        write_atomic(&light1, format_f64_series(&recording.light1).as_bytes())?;
        write_atomic(&light2, format_f64_series(&recording.light2).as_bytes())?;
        let manifest = SamplesManifest {
            samples: recording.len(),
            fingerprint: recording.fingerprint(),
        };
        self.write_manifest(SAMPLES_MANIFEST, &manifest)?;
        debug!(
            "wrote {} samples to {}",
            recording.len(),
            self.dir.display()
        );
        Ok(())
    }

    /// Cached spectra for both lights, if they were computed for `expected`.
    pub fn read_spectra(&self, expected: &SpectraManifest) -> Result<Option<[Spectrum; 2]>> {
        let manifest: SpectraManifest = match self.read_manifest(SPECTRA_MANIFEST)? {
            Some(m) => m,
            None => return Ok(None),
        };
        if manifest != *expected {
            warn!(
                "cached spectra cover {} samples (limit {:?}, data {:016x}), need {} (limit {:?}, data {:016x}); recomputing",
                manifest.samples,
                manifest.max_duration,
                manifest.fingerprint,
                expected.samples,
                expected.max_duration,
                expected.fingerprint
            );
            return Ok(None);
        }
        let freqs = read_f64_series(&self.dir.join(FREQS_FILE))?;
        let read = |channel: Channel| -> Result<Spectrum> {
            let amps = read_f64_series(&self.dir.join(SPECTRUM_FILES[channel.index()]))?;
            if amps.len() != freqs.len() {
                return Err(WinkError::MalformedData(format!(
                    "cached {channel} spectrum has {} bins but {} frequencies",
                    amps.len(),
                    freqs.len()
                )));
            }
            Ok(Spectrum {
                freqs: freqs.clone(),
                amps,
            })
        };
        Ok(Some([read(Channel::Light1)?, read(Channel::Light2)?]))
    }

    pub fn write_spectra(&self, manifest: &SpectraManifest, spectra: &[Spectrum; 2]) -> Result<()> {
        if spectra[0].freqs != spectra[1].freqs {
            return Err(WinkError::MalformedData(
                "spectra of both lights must share a frequency axis".into(),
            ));
        }
        self.ensure_dir()?;
        write_atomic(
            &self.dir.join(FREQS_FILE),
            format_f64_series(&spectra[0].freqs).as_bytes(),
        )?;
        for channel in Channel::ALL {
            write_atomic(
                &self.dir.join(SPECTRUM_FILES[channel.index()]),
                format_f64_series(&spectra[channel.index()].amps).as_bytes(),
            )?;
        }
        // manifest last, so a reader never pairs it with stale arrays
        self.write_manifest(SPECTRA_MANIFEST, manifest)
    }

    /// `None` when the manifest is absent or unreadable.
    fn read_manifest<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.dir.join(name);
        if !path.is_file() {
            return Ok(None);
        }
        let file = fs::File::open(&path).map_err(|e| WinkError::io(&path, e))?;
        match serde_json::from_reader(file) {
            Ok(m) => Ok(Some(m)),
            Err(err) => {
                warn!("ignoring unreadable {}: {err}", path.display());
                Ok(None)
            }
        }
    }

    fn write_manifest<T: Serialize>(&self, name: &str, manifest: &T) -> Result<()> {
        let json = serde_json::to_vec_pretty(manifest)
            .map_err(|e| WinkError::MalformedData(e.to_string()))?;
        write_atomic(&self.dir.join(name), &json)
    }

    fn remove_if_present(&self, name: &str) -> Result<()> {
        let path = self.dir.join(name);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("removed stale {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WinkError::io(&path, e)),
        }
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| WinkError::io(&self.dir, e))
    }
}

/// Write through a sibling temp file and rename over the target.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| WinkError::io(dir, e))?;
    tmp.write_all(contents)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| WinkError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| WinkError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn recording() -> Recording {
        let times: Vec<f64> = (0..64).map(|i| i as f64 / 29.97).collect();
        let light1 = times.iter().map(|t| (t * 7.1).sin().abs()).collect();
        let light2 = times.iter().map(|t| (t * 3.3).cos().powi(2)).collect();
        Recording::new(times, light1, light2).expect("valid")
    }

    #[test]
    fn sample_cache_round_trip_is_bit_exact() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path().join("nested/data"));
        assert!(!cache.has_samples());
        let original = recording();
        cache.write_samples(&original).expect("write");
        assert!(cache.has_samples());
        let loaded = cache.read_samples().expect("read");
        for (a, b) in original.light1.iter().zip(&loaded.light1) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        assert_eq!(original, loaded);
    }

    #[test]
    fn rewrite_replaces_previous_contents() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path());
        cache.write_samples(&recording()).unwrap();
        let mut shorter = recording();
        shorter.truncate(1.0);
        cache.write_samples(&shorter).unwrap();
        assert_eq!(cache.read_samples().unwrap(), shorter);
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 4, "temp files must not linger");
    }

    #[test]
    fn mismatched_lengths_are_rejected_on_read() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path());
        cache.write_samples(&recording()).unwrap();
        fs::write(dir.path().join(LIGHT_FILES[1]), "0.5\n0.25\n").unwrap();
        assert!(matches!(
            cache.read_samples(),
            Err(WinkError::MalformedData(_))
        ));
    }

    #[test]
    fn spectra_reused_only_for_matching_manifest() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path());
        let spectrum = Spectrum {
            freqs: vec![0.0, 0.5, 1.0],
            amps: vec![3.0, 1.0, 2.0],
        };
        let manifest = SpectraManifest {
            samples: 6,
            max_duration: None,
            fingerprint: 7,
        };
        assert!(cache.read_spectra(&manifest).unwrap().is_none());
        cache
            .write_spectra(&manifest, &[spectrum.clone(), spectrum.clone()])
            .unwrap();
        let hit = cache.read_spectra(&manifest).unwrap().expect("hit");
        assert_eq!(hit[0], spectrum);
        let other = SpectraManifest {
            samples: 6,
            max_duration: Some(10.0),
            fingerprint: 7,
        };
        assert!(cache.read_spectra(&other).unwrap().is_none());
        let other_data = SpectraManifest {
            fingerprint: 8,
            ..manifest
        };
        assert!(cache.read_spectra(&other_data).unwrap().is_none());
    }

    #[test]
    fn new_samples_drop_cached_spectra() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path());
        let first = recording();
        cache.write_samples(&first).unwrap();
        let manifest = SpectraManifest::for_recording(&first, None);
        let spectrum = Spectrum {
            freqs: vec![0.0, 1.0],
            amps: vec![1.0, 1.0],
        };
        cache
            .write_spectra(&manifest, &[spectrum.clone(), spectrum])
            .unwrap();
        assert!(cache.read_spectra(&manifest).unwrap().is_some());

        let mut second = recording();
        second.light1.iter_mut().for_each(|v| *v = 1.0 - *v);
        cache.write_samples(&second).unwrap();
        assert!(!dir.path().join(SPECTRA_MANIFEST).exists());
        assert!(cache.read_spectra(&manifest).unwrap().is_none());
    }

    #[test]
    fn arrays_from_another_write_are_detected() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path());
        cache.write_samples(&recording()).unwrap();
        let stale_manifest = fs::read(dir.path().join(SAMPLES_MANIFEST)).unwrap();

        // same length, different values: only the fingerprint tells them apart
        let mut other = recording();
        other.light2.iter_mut().for_each(|v| *v *= 0.5);
        cache.write_samples(&other).unwrap();
        assert_eq!(cache.read_samples().unwrap(), other);

        fs::write(dir.path().join(SAMPLES_MANIFEST), stale_manifest).unwrap();
        match cache.read_samples() {
            Err(WinkError::MalformedData(msg)) => assert!(msg.contains("samples.json"), "{msg}"),
            other => panic!("expected a mismatch, got {other:?}"),
        }
    }

    #[test]
    fn arrays_without_manifest_are_accepted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(TIMES_FILE), "0.0\n0.5\n1.0\n").unwrap();
        fs::write(dir.path().join(LIGHT_FILES[0]), "0.1\n0.2\n0.3\n").unwrap();
        fs::write(dir.path().join(LIGHT_FILES[1]), "1\n0\n1\n").unwrap();
        let cache = Cache::new(dir.path());
        assert!(cache.has_samples());
        assert_eq!(cache.read_samples().unwrap().light2, vec![1.0, 0.0, 1.0]);
    }
}
