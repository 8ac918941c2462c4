use pubsub::PubSub;

/// A Node is an entity that can publish and react to subscibed messages.
///
/// It can perform processing in the background (using `threads`) but `update` is always called
/// from the loop that also drives the `PubSub` ticks.
pub trait Node {
    /// Allows the Node to update itself and perform logic. Keep it brief, every other node
    /// waits for this call to return.
    fn update(&mut self) {}

    /// Called when the Node should terminate. Terminate background threads, flush files etc. here.
    fn terminate(&mut self) {}
}

pub trait NodeConfig {
    /// Constructs a new Node object. This should also subscribe or request permission to
    /// publish via the Publish/Subscribe mechanism.
    fn instantiate(&self, pubsub: &mut PubSub) -> Box<dyn Node>;
}
