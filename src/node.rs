use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::RawMutex, Mutex};

use crate::{
    dispatch, frame::raw_id, CanFrame, CanTransport, Calibration, Ignored, IntegrityError,
    IntegrityFlags, MalformedCommand, Message, NodeConfig, NvmStore, Outcome, Response,
    SettingsStore,
};

/// A calibration node: one image, the bus it answers on and the memory its
/// settings persist to.
///
/// Call [`Node::init`] once at boot, then feed it frames through
/// [`Node::poll`] or [`Node::handle_frame`].
#[derive(Debug)]
pub struct Node<T, N, const M: usize, const S: usize, const O: usize> {
    config: NodeConfig,
    calibration: Calibration<M, S, O>,
    transport: T,
    store: SettingsStore<N>,
    flags: IntegrityFlags,
}

impl<T, N, const M: usize, const S: usize, const O: usize> Node<T, N, M, S, O>
where
    T: CanTransport,
    N: NvmStore,
{
    pub fn new(config: NodeConfig, calibration: Calibration<M, S, O>, transport: T, nvm: N) -> Self {
        Self {
            config,
            calibration,
            transport,
            store: SettingsStore::new(nvm),
            flags: IntegrityFlags::default(),
        }
    }

    /// Boot sequence: defaults in, overrides released, then the persisted
    /// settings restored if they pass the integrity checks.
    ///
    /// A failure is recorded in [`Node::integrity_flags`] and returned, but the
    /// node is usable either way.
    pub fn init(&mut self) -> Result<(), IntegrityError> {
        self.calibration.load_defaults();
        self.calibration.reset_overrides();

        let result = self.store.load(&mut self.calibration);
        if let Err(error) = &result {
            self.flags.record(error);
        }

        info!(
            "node: device {=u8} ready, settings revision {=u8}",
            self.calibration.device_id(),
            self.calibration.revision()
        );

        result
    }

    pub fn integrity_flags(&self) -> IntegrityFlags {
        self.flags
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn calibration(&self) -> &Calibration<M, S, O> {
        &self.calibration
    }

    pub fn calibration_mut(&mut self) -> &mut Calibration<M, S, O> {
        &mut self.calibration
    }

    /// Persists the current settings, as a `SaveSettings` request would.
    pub fn save_settings(&mut self) {
        self.store.save(&self.calibration.settings);
    }

    /// Runs one received frame and sends the reply, if any.
    ///
    /// The returned error is the transport's, from sending the reply. The
    /// request has already taken effect by then.
    pub fn handle_frame(&mut self, frame: &CanFrame) -> Result<Outcome, T::Error> {
        if frame.id() != self.config.command_id {
            trace!("node: skipping frame on id {=u32:#x}", raw_id(frame.id()));
            return Ok(Outcome::Ignored(Ignored::ForeignId));
        }

        let outcome = match Message::from_frame(frame) {
            Ok(message) => dispatch(
                &mut self.calibration,
                &mut self.store,
                &self.config,
                &message,
            ),
            Err(e) => MalformedCommand::from(e).into(),
        };

        match &outcome {
            Outcome::Reply(response) => self.send(response)?,
            Outcome::Ignored(reason) => debug!("node: ignored frame: {}", reason),
        }

        Ok(outcome)
    }

    /// Takes at most one frame off the bus and handles it.
    pub fn poll(&mut self) -> Result<Option<Outcome>, T::Error> {
        match self.transport.receive_frame()? {
            Some(frame) => self.handle_frame(&frame).map(Some),
            None => Ok(None),
        }
    }

    // The device ID may have just been rewritten, so it is read at send time
    fn send(&mut self, response: &Response) -> Result<(), T::Error> {
        let message = response.as_message(self.calibration.device_id());

        if let Err(e) = self
            .transport
            .send_frame(self.config.response_id, &message.as_bytes())
        {
            warn!("node: failed to send {} reply", response.kind());
            return Err(e);
        }

        Ok(())
    }

    /// Tears the node down, handing back the transport and the memory.
    pub fn release(self) -> (T, N) {
        (self.transport, self.store.into_inner())
    }
}

/// A [`Node`] behind a blocking mutex, for targets where frames arrive in an
/// interrupt while the main loop also touches the image.
///
/// Each call holds the lock for the whole request, persistence included.
pub struct SharedNode<R, T, N, const M: usize, const S: usize, const O: usize> {
    inner: Mutex<R, RefCell<Node<T, N, M, S, O>>>,
}

impl<R, T, N, const M: usize, const S: usize, const O: usize> SharedNode<R, T, N, M, S, O>
where
    R: RawMutex,
    T: CanTransport,
    N: NvmStore,
{
    pub const fn new(node: Node<T, N, M, S, O>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(node)),
        }
    }

    /// Runs `f` with exclusive access to the node. `f` must not call back
    /// into this `SharedNode`.
    pub fn lock<U>(&self, f: impl FnOnce(&mut Node<T, N, M, S, O>) -> U) -> U {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn handle_frame(&self, frame: &CanFrame) -> Result<Outcome, T::Error> {
        self.lock(|node| node.handle_frame(frame))
    }

    pub fn poll(&self) -> Result<Option<Outcome>, T::Error> {
        self.lock(|node| node.poll())
    }
}
