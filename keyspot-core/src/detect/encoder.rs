use crate::{
    buffering::RingBuffer,
    error::Result,
    inference::{invoke_checked, TensorModel},
};

/// The encoder's autoregressive hidden state.
///
/// Held in a ring so that every invocation reads the whole state (draining
/// it) and writes the replacement (refilling it): the state is overwritten,
/// never appended to.
#[derive(Debug, Clone)]
pub struct EncodeState {
    ring: RingBuffer<f32>,
}

impl EncodeState {
    pub fn new(width: usize) -> Self {
        let mut ring = RingBuffer::new(width, 0.0);
        ring.fill(0.0);
        Self { ring }
    }

    pub fn width(&self) -> usize {
        self.ring.capacity()
    }

    /// Read the full state into `out` (cleared first).
    pub fn take_into(&mut self, out: &mut Vec<f32>) -> Result<()> {
        out.clear();
        for _ in 0..self.ring.capacity() {
            out.push(self.ring.read()?);
        }
        Ok(())
    }

    /// Store a new state produced by the encoder.
    pub fn store(&mut self, state: &[f32]) -> Result<()> {
        self.ring.write_all(state)
    }

    /// Zero the state.
    pub fn clear(&mut self) {
        self.ring.reset().fill(0.0);
    }
}

/// Runs the encode model over the full mel window plus the carried hidden
/// state, and keeps a sliding window of encoded frames for the classifier.
pub struct SequenceEncoder {
    model: Box<dyn TensorModel>,
    state: EncodeState,
    encode_width: usize,
    window: RingBuffer<f32>,
    fill: f32,
    mel_scratch: Vec<f32>,
    state_scratch: Vec<f32>,
}

impl SequenceEncoder {
    /// # Errors
    /// `InvalidConfiguration` unless the encode model takes
    /// `[mel_len, state_width]` and returns `[encode_width, state_width]`.
    pub fn new(
        model: Box<dyn TensorModel>,
        mel_len: usize,
        encode_width: usize,
        encode_frames: usize,
        state_width: usize,
        fill: f32,
    ) -> Result<Self> {
        model.signature().ensure(
            "encode",
            &[mel_len, state_width],
            &[encode_width, state_width],
        )?;
        let mut window = RingBuffer::new(encode_frames * encode_width, fill);
        window.fill(fill);
        Ok(Self {
            model,
            state: EncodeState::new(state_width),
            encode_width,
            window,
            fill,
            mel_scratch: Vec::with_capacity(mel_len),
            state_scratch: Vec::with_capacity(state_width),
        })
    }

    /// Drain `mel_window`, encode it with the current state, append the
    /// encoded frame and replace the state.
    pub fn encode(&mut self, mel_window: &mut RingBuffer<f32>) -> Result<()> {
        self.mel_scratch.clear();
        mel_window.rewind().drain_into(&mut self.mel_scratch)?;
        self.state.take_into(&mut self.state_scratch)?;

        let mut outputs = invoke_checked(
            "encode",
            self.model.as_mut(),
            &[self.mel_scratch.as_slice(), self.state_scratch.as_slice()],
        )?;

        self.window.rewind().seek(self.encode_width as isize);
        self.window.write_all(&outputs[0])?;
        let new_state = outputs.swap_remove(1);
        self.state.store(&new_state)
    }

    pub fn window(&self) -> &RingBuffer<f32> {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut RingBuffer<f32> {
        &mut self.window
    }

    pub fn state(&self) -> &EncodeState {
        &self.state
    }

    /// Re-prime the encode window. The hidden state is only cleared when
    /// `clear_state` is set.
    pub fn reset(&mut self, clear_state: bool) {
        self.window.reset().fill(self.fill);
        if clear_state {
            self.state.clear();
        }
    }
}
