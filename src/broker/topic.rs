use rand::seq::IteratorRandom;
use std::collections::{HashMap, HashSet};

/// A subscriber is identified by its callback address.
pub type SubscriberId = String;

/// A named topic and the set of addresses subscribed to it.
///
/// Set semantics make Subscribe idempotent; insertion order is irrelevant.
#[derive(Debug, Default, Clone)]
pub struct Topic {
    pub name: String,
    pub subscribers: HashSet<SubscriberId>,
}

impl Topic {
    /// Creates a new instance of the Topic with the given name
    /// Initializes an empty set of subscribers
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: HashSet::new(),
        }
    }

    /// Adds the subscriber. If the subscriber is already subscribed, it has no effect.
    pub fn subscribe(&mut self, id: SubscriberId) {
        self.subscribers.insert(id);
    }

    /// Removes the subscriber. If the subscriber is not subscribed, it has no effect.
    pub fn unsubscribe(&mut self, id: &str) {
        self.subscribers.remove(id);
    }

    /// Picks one subscriber uniformly at random, or `None` when there are none.
    pub fn pick_subscriber(&self) -> Option<&SubscriberId> {
        self.subscribers.iter().choose(&mut rand::thread_rng())
    }
}

/// The topics owned by a single partition.
///
/// Each table belongs to exactly one worker task and is never shared, which
/// is why none of these methods take a lock. Topics are only ever created by
/// an explicit `create`; `subscribe`/`unsubscribe` on a missing topic report
/// `false` and change nothing.
#[derive(Debug, Default)]
pub struct TopicTable {
    topics: HashMap<String, Topic>,
}

impl TopicTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the topic if absent. Returns `true` if it was newly created.
    pub fn create(&mut self, name: &str) -> bool {
        if self.topics.contains_key(name) {
            return false;
        }
        self.topics.insert(name.to_string(), Topic::new(name));
        true
    }

    pub fn subscribe(&mut self, name: &str, subscriber: &str) -> bool {
        match self.topics.get_mut(name) {
            Some(topic) => {
                topic.subscribe(subscriber.to_string());
                true
            }
            None => false,
        }
    }

    pub fn unsubscribe(&mut self, name: &str, subscriber: &str) -> bool {
        match self.topics.get_mut(name) {
            Some(topic) => {
                topic.unsubscribe(subscriber);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Topic> {
        self.topics.get(name)
    }

    pub fn subscribers(&self, name: &str) -> Option<&HashSet<SubscriberId>> {
        self.topics.get(name).map(|topic| &topic.subscribers)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
