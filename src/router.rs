//! Routing of received frames to application callbacks.
//!
//! [`Router`] maps packet types and response handler ids to any number of
//! callbacks. `Normal` frames carry a [`Response`] which is decoded once and
//! routed by its handler id; every other packet type is routed by the type
//! tag in the frame header.
//!
//! Callbacks run synchronously, in registration order, on the thread calling
//! [`Router::dispatch`]. A callback that returns an error or panics is logged
//! and skipped; the remaining callbacks and later frames are unaffected.

use std::{
    collections::HashMap,
    error::Error,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
};

use log::{debug, error, trace, warn};

use crate::{
    codec::RecoveryPolicy,
    envelope::Response,
    frame::{Frame, PacketType},
    panic::format_panic,
    payload::{BincodeCodec, Message, PayloadCodec, PayloadError},
};

/// Error type returned by fallible callbacks.
pub type HandlerError = Box<dyn Error + Send + Sync>;

/// Result type returned by callbacks.
pub type HandlerResult = Result<(), HandlerError>;

type FrameCallback = Box<dyn FnMut(&Frame) -> HandlerResult + Send>;
type ResponseCallback = Box<dyn FnMut(&Response) -> HandlerResult + Send>;

/// Outcome of dispatching a single frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// At least one callback ran.
    Delivered {
        /// Callbacks invoked.
        invoked: usize,
        /// Callbacks that returned an error or panicked.
        failed: usize,
    },
    /// No callback is registered for the frame's route.
    Unrouted,
    /// The payload could not be decoded; the frame was discarded.
    Dropped,
}

/// Registry of callbacks keyed by packet type and response handler id.
///
/// # Examples
///
/// ```
/// use tickwire::{
///     envelope::Response,
///     frame::{Frame, PacketType},
///     payload::{BincodeCodec, PayloadCodec},
///     router::{DispatchOutcome, Router},
/// };
///
/// let mut router = Router::new();
/// router.register_handler(0, |response: &Response| {
///     assert!(response.is_success());
///     Ok(())
/// });
///
/// let payload = BincodeCodec
///     .serialize(&Response::new(0, 0, 0, Vec::new()))
///     .expect("encode");
/// let outcome = router.dispatch(&Frame::new(PacketType::Normal, payload));
/// assert_eq!(outcome, DispatchOutcome::Delivered { invoked: 1, failed: 0 });
/// ```
pub struct Router<C = BincodeCodec> {
    codec: C,
    packets: HashMap<PacketType, Vec<FrameCallback>>,
    responses: HashMap<u32, Vec<ResponseCallback>>,
}

impl Router<BincodeCodec> {
    /// Create an empty router using the default payload codec.
    #[must_use]
    pub fn new() -> Self { Self::with_codec(BincodeCodec) }
}

impl Default for Router<BincodeCodec> {
    fn default() -> Self { Self::new() }
}

impl<C> fmt::Debug for Router<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("packet_routes", &self.packets.len())
            .field("response_routes", &self.responses.len())
            .finish_non_exhaustive()
    }
}

impl<C> Router<C>
where
    C: PayloadCodec + Clone,
{
    /// Create an empty router decoding payloads with `codec`.
    #[must_use]
    pub fn with_codec(codec: C) -> Self {
        Self {
            codec,
            packets: HashMap::new(),
            responses: HashMap::new(),
        }
    }

    /// Subscribe to responses for `handler_id`.
    ///
    /// Responses with a nonzero code are delivered too; use
    /// [`Response::into_result`] to treat them as failures.
    pub fn register_handler<F>(&mut self, handler_id: u32, callback: F)
    where
        F: FnMut(&Response) -> HandlerResult + Send + 'static,
    {
        self.responses
            .entry(handler_id)
            .or_default()
            .push(Box::new(callback));
    }

    /// Subscribe to raw frames of `packet_type`.
    ///
    /// `Ping` callbacks observe heartbeat replies after the session has
    /// already recorded them; an unobserved reply is not reported as
    /// unrouted.
    pub fn register_packet<F>(&mut self, packet_type: PacketType, callback: F)
    where
        F: FnMut(&Frame) -> HandlerResult + Send + 'static,
    {
        self.packets
            .entry(packet_type)
            .or_default()
            .push(Box::new(callback));
    }

    /// Subscribe to frames of `packet_type`, decoding the payload as `M`.
    ///
    /// A frame that fails to decode is dropped for this callback and does not
    /// count as a callback failure.
    pub fn on_message<M, F>(&mut self, packet_type: PacketType, mut callback: F)
    where
        M: Message + 'static,
        F: FnMut(M) -> HandlerResult + Send + 'static,
    {
        let codec = self.codec.clone();
        self.register_packet(packet_type, move |frame| {
            let message = codec.deserialize::<M>(frame.payload())?;
            callback(message)
        });
    }

    /// Subscribe to the decoded data of successful responses for
    /// `handler_id`.
    pub fn on_response<M, F>(&mut self, handler_id: u32, mut callback: F)
    where
        M: Message + 'static,
        F: FnMut(M) -> HandlerResult + Send + 'static,
    {
        let codec = self.codec.clone();
        self.register_handler(handler_id, move |response| {
            if let Err(failure) = response.clone().into_result() {
                return Err(failure.into());
            }
            let message = codec.deserialize::<M>(response.data())?;
            callback(message)
        });
    }

    /// Number of callbacks registered for `handler_id`.
    #[must_use]
    pub fn handler_count(&self, handler_id: u32) -> usize {
        self.responses.get(&handler_id).map_or(0, Vec::len)
    }

    /// Route `frame` to its callbacks.
    ///
    /// A callback that fails with a [`PayloadError`] could not decode the
    /// frame and is not counted as invoked. A frame that no callback could
    /// decode is [`Dropped`](DispatchOutcome::Dropped).
    pub fn dispatch(&mut self, frame: &Frame) -> DispatchOutcome {
        let packet_type = frame.packet_type();
        debug!("dispatching {packet_type} frame ({} bytes)", frame.payload().len());
        let mut stats = Stats::default();

        if let Some(callbacks) = self.packets.get_mut(&packet_type) {
            for callback in callbacks.iter_mut() {
                stats.record(invoke(callback.as_mut(), frame, packet_type));
            }
        }

        if packet_type == PacketType::Normal {
            match self.codec.deserialize::<Response>(frame.payload()) {
                Ok(response) => {
                    if !response.is_success() {
                        warn!(
                            "request to handler {} failed with response code {}",
                            response.handler_id(),
                            response.response_code()
                        );
                    }
                    if let Some(callbacks) = self.responses.get_mut(&response.handler_id()) {
                        for callback in callbacks.iter_mut() {
                            stats.record(invoke(callback.as_mut(), &response, packet_type));
                        }
                    } else if stats.is_empty() {
                        warn!(
                            "no handler registered for response handler id {}; dropping",
                            response.handler_id()
                        );
                        return DispatchOutcome::Unrouted;
                    }
                }
                Err(err) => stats.record(Verdict::Undecodable(err)),
            }
        }

        stats.into_outcome(packet_type)
    }
}

/// Result of running one callback.
enum Verdict {
    Handled,
    Failed,
    Undecodable(PayloadError),
}

#[derive(Default)]
struct Stats {
    invoked: usize,
    failed: usize,
    undecodable: Option<PayloadError>,
}

impl Stats {
    fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Handled => self.invoked += 1,
            Verdict::Failed => {
                self.invoked += 1;
                self.failed += 1;
            }
            Verdict::Undecodable(err) => {
                self.undecodable.get_or_insert(err);
            }
        }
    }

    fn is_empty(&self) -> bool { self.invoked == 0 && self.undecodable.is_none() }

    fn into_outcome(self, packet_type: PacketType) -> DispatchOutcome {
        if self.invoked > 0 {
            return DispatchOutcome::Delivered {
                invoked: self.invoked,
                failed: self.failed,
            };
        }
        match self.undecodable {
            Some(err) => {
                warn!("dropping undecodable {packet_type} frame: {err}");
                crate::metrics::inc_dropped_frames();
                DispatchOutcome::Dropped
            }
            None if packet_type == PacketType::Ping => {
                trace!("no observer for heartbeat reply");
                DispatchOutcome::Unrouted
            }
            None => {
                warn!("no handler registered for {packet_type} frame; dropping");
                DispatchOutcome::Unrouted
            }
        }
    }
}

/// Run one callback, containing both error returns and panics.
fn invoke<A: ?Sized>(
    callback: &mut (dyn FnMut(&A) -> HandlerResult + Send),
    arg: &A,
    packet_type: PacketType,
) -> Verdict {
    match catch_unwind(AssertUnwindSafe(|| callback(arg))) {
        Ok(Ok(())) => Verdict::Handled,
        Ok(Err(err)) => match err.downcast::<PayloadError>() {
            Ok(payload) if payload.recovery_policy() == RecoveryPolicy::Drop => {
                debug!("{packet_type} callback could not decode payload: {payload}");
                Verdict::Undecodable(*payload)
            }
            Ok(payload) => failed(packet_type, &payload),
            Err(err) => failed(packet_type, &err),
        },
        Err(panic) => {
            error!("{packet_type} callback panicked: {}", format_panic(panic));
            crate::metrics::inc_handler_errors();
            Verdict::Failed
        }
    }
}

fn failed(packet_type: PacketType, err: &dyn fmt::Display) -> Verdict {
    warn!("{packet_type} callback failed: {err}");
    crate::metrics::inc_handler_errors();
    Verdict::Failed
}

#[cfg(test)]
mod tests;
