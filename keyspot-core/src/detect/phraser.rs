//! Posterior smoothing and keyword-phrase matching.

use crate::{
    buffering::RingBuffer,
    error::{KeyspotError, Result},
};

/// An ordered sequence of class indices that must appear, in order, in the
/// phrasing window's argmax sequence.
///
/// Keyword `k` of the keyword list maps to class `k + 1`; a terminal class 0
/// is appended so a match only completes once the last keyword has ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseDefinition {
    text: String,
    classes: Vec<usize>,
}

impl PhraseDefinition {
    /// Build from a space-separated keyword sequence.
    ///
    /// # Errors
    /// `InvalidConfiguration` for an empty phrase or an unknown keyword.
    pub fn parse(text: &str, keywords: &[String]) -> Result<Self> {
        let mut classes = Vec::new();
        for word in text.split_whitespace() {
            let index = keywords
                .iter()
                .position(|k| k == word)
                .ok_or_else(|| KeyspotError::config(format!("unknown keyword \"{word}\"")))?;
            classes.push(index + 1);
        }
        if classes.is_empty() {
            return Err(KeyspotError::config("empty phrase"));
        }
        classes.push(0);
        Ok(Self {
            text: text.split_whitespace().collect::<Vec<_>>().join(" "),
            classes,
        })
    }

    /// Build from explicit class indices, used as given.
    ///
    /// # Errors
    /// `InvalidConfiguration` if `classes` is empty.
    pub fn from_classes(text: impl Into<String>, classes: Vec<usize>) -> Result<Self> {
        if classes.is_empty() {
            return Err(KeyspotError::config("phrase has no classes"));
        }
        Ok(Self {
            text: text.into(),
            classes,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    /// Single left-to-right scan: the cursor advances each time the next
    /// observed class equals the phrase's class at the cursor.
    pub fn matches(&self, argmaxes: &[usize]) -> bool {
        let mut cursor = 0;
        for &class in argmaxes {
            if class == self.classes[cursor] {
                cursor += 1;
                if cursor == self.classes.len() {
                    return true;
                }
            }
        }
        false
    }
}

/// Moving mean of per-class posteriors over `smooth_frames` frames.
pub struct PosteriorSmoother {
    num_classes: usize,
    window: RingBuffer<f32>,
    means: Vec<f32>,
}

impl PosteriorSmoother {
    pub fn new(num_classes: usize, smooth_frames: usize) -> Self {
        let mut window = RingBuffer::new(smooth_frames * num_classes, 0.0);
        window.fill(0.0);
        Self {
            num_classes,
            window,
            means: vec![0.0; num_classes],
        }
    }

    /// Add one posterior vector and return the smoothed vector.
    pub fn push(&mut self, posteriors: &[f32]) -> Result<&[f32]> {
        self.window.rewind().seek(self.num_classes as isize);
        self.window.write_all(posteriors)?;

        self.means.iter_mut().for_each(|m| *m = 0.0);
        while !self.window.is_empty() {
            for mean in self.means.iter_mut() {
                *mean += self.window.read()?;
            }
        }
        let frames = (self.window.capacity() / self.num_classes) as f32;
        self.means.iter_mut().for_each(|m| *m /= frames);
        Ok(self.means.as_slice())
    }

    pub fn reset(&mut self) {
        self.window.reset().fill(0.0);
    }
}

/// Matches the per-frame argmax sequence of a sliding window of smoothed
/// posteriors against the configured phrases.
pub struct Phraser {
    num_classes: usize,
    window: RingBuffer<f32>,
    phrases: Vec<PhraseDefinition>,
    argmaxes: Vec<usize>,
    class_max: Vec<f32>,
}

impl Phraser {
    pub fn new(num_classes: usize, phrase_frames: usize, phrases: Vec<PhraseDefinition>) -> Self {
        let mut window = RingBuffer::new(phrase_frames * num_classes, 0.0);
        window.fill(0.0);
        Self {
            num_classes,
            window,
            phrases,
            argmaxes: Vec::with_capacity(phrase_frames),
            class_max: vec![0.0; num_classes],
        }
    }

    /// Add one smoothed posterior vector; returns the first phrase that
    /// matches the current window.
    pub fn push(&mut self, smoothed: &[f32]) -> Result<Option<&PhraseDefinition>> {
        self.window.rewind().seek(self.num_classes as isize);
        self.window.write_all(smoothed)?;

        self.argmaxes.clear();
        while !self.window.is_empty() {
            let mut best = 0;
            let mut best_value = f32::NEG_INFINITY;
            for class in 0..self.num_classes {
                let value = self.window.read()?;
                if value > self.class_max[class] {
                    self.class_max[class] = value;
                }
                if value > best_value {
                    best = class;
                    best_value = value;
                }
            }
            self.argmaxes.push(best);
        }

        Ok(self.phrases.iter().find(|p| p.matches(&self.argmaxes)))
    }

    /// Highest smoothed posterior seen per class since the last reset.
    pub fn class_max(&self) -> &[f32] {
        &self.class_max
    }

    pub fn reset(&mut self) {
        self.window.reset().fill(0.0);
        self.class_max.iter_mut().for_each(|m| *m = 0.0);
    }
}
