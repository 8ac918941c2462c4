use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    marker::PhantomData,
    sync::{
        mpsc::{self, channel, Receiver, Sender},
        Arc,
    },
};

use tracing::{debug, warn};

type Message = Arc<dyn Any + Send + Sync + 'static>;

/// A simple publish/subscribe system that allows sending and subscribing to values on different topics.
/// Each topic name is allocated to a single type, attempts to subscribe and publish to the same topic with
/// different types will panic!
pub struct PubSub {
    topics: HashMap<String, Topic>,
}

struct Topic {
    value_type: TypeId,
    value_name: &'static str,
    incoming_sender: Sender<Message>,
    incoming_recv: Receiver<Message>,
    outgoing: Vec<Sender<Message>>,
}

impl Topic {
    fn new<T: Any + Send + Sync + 'static>() -> Self {
        // create the channel where items will be sent to when published
        let (send, recv) = channel();

        Self {
            value_type: TypeId::of::<T>(),
            value_name: type_name::<T>(),
            incoming_sender: send,
            incoming_recv: recv,
            outgoing: Vec::new(),
        }
    }

    /// Forwards all pending messages to the live subscribers, dropping the ones that hung up.
    fn distribute(&mut self, name: &str) -> usize {
        let mut delivered = 0;
        while let Ok(v) = self.incoming_recv.try_recv() {
            let before = self.outgoing.len();
            self.outgoing.retain(|s| s.send(v.clone()).is_ok());

            if self.outgoing.len() != before {
                debug!(
                    "Dropped {} closed subscription(s) on topic '{name}'",
                    before - self.outgoing.len()
                );
            }
            delivered += self.outgoing.len();
        }
        delivered
    }
}

pub struct Subscription<T: Any + Send + Sync + 'static> {
    topic: String,
    reciever: Receiver<Message>,
    _phantom: PhantomData<T>,
}

impl<T: Any + Send + Sync + 'static> Subscription<T> {
    /// Tries to receive a value from the subscribed topic, but will not block if no data is available.
    pub fn try_recv(&mut self) -> Option<Arc<T>> {
        match self.reciever.try_recv() {
            Ok(value) => Some(Self::downcast(value)),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => {
                warn!("Subscription to '{}' disconnected", self.topic);
                None
            }
        }
    }

    /// Drains everything currently queued on the topic.
    pub fn drain(&mut self) -> Vec<Arc<T>> {
        self.reciever.try_iter().map(Self::downcast).collect()
    }

    fn downcast(value: Message) -> Arc<T> {
        // the topic type was checked when subscribing, so this cannot fail
        value
            .downcast::<T>()
            .unwrap_or_else(|_| panic!("Received value was not of type '{}'", type_name::<T>()))
    }
}

#[derive(Clone)]
pub struct Publisher<T: Any + Send + Sync + 'static> {
    topic: String,
    send: Sender<Message>,
    _p: PhantomData<T>,
}

impl<T: Any + Send + Sync + 'static> Publisher<T> {
    /// Publishes a value wrapped in an `Arc` to the topic.
    pub fn publish(&mut self, value: Arc<T>) {
        if self.send.send(value).is_err() {
            warn!("Publishing to '{}' after the PubSub was dropped", self.topic);
        }
    }
}

impl Default for PubSub {
    fn default() -> Self {
        Self::new()
    }
}

impl PubSub {
    pub fn new() -> Self {
        Self {
            topics: HashMap::new(),
        }
    }

    fn get_topic_by_name_or_insert<T: Any + Send + Sync + 'static>(
        &mut self,
        topic: &str,
    ) -> &mut Topic {
        let t = self
            .topics
            .entry(topic.into())
            .or_insert_with(Topic::new::<T>);

        // make sure this topic was not previously claimed with a different type.
        assert!(
            t.value_type == TypeId::of::<T>(),
            "Topic {topic} already claimed by type '{}', but current type is '{}'",
            t.value_name,
            type_name::<T>()
        );

        t
    }

    /// Register as a publisher of the specific type to the topic name. Panics if the topic has already been allocated to values of a different type.
    pub fn publish<T: Any + Send + Sync + 'static>(&mut self, topic: &str) -> Publisher<T> {
        let t = self.get_topic_by_name_or_insert::<T>(topic);

        Publisher {
            topic: topic.to_string(),
            send: t.incoming_sender.clone(),
            _p: PhantomData,
        }
    }

    /// Subscribe to messages of the specific type on the topic name. Panics if the topic has already been allocated to values of a different type.
    pub fn subscribe<T: Any + Send + Sync + 'static>(&mut self, topic: &str) -> Subscription<T> {
        let t = self.get_topic_by_name_or_insert::<T>(topic);

        // create a channel for receiving the published messages
        let (send, recv) = channel();

        t.outgoing.push(send);

        Subscription {
            topic: topic.to_owned(),
            reciever: recv,
            _phantom: PhantomData,
        }
    }

    /// Proceses and distributes messages to all subscribers. Returns the number of deliveries made.
    pub fn tick(&mut self) -> usize {
        self.topics
            .iter_mut()
            .map(|(name, t)| t.distribute(name))
            .sum()
    }
}
