// DltExport - core/decoder.rs
//
// Decoder facility: expands a parsed message into its human-readable form.
// Plugins are consulted in order; the first one that claims a message
// decodes it.

use crate::core::model::{Argument, DltMessage};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

/// Turns a parsed message into its decoded form, in place.
///
/// `silent` requests non-interactive behaviour: decoders must not prompt
/// and should keep diagnostics quiet.
pub trait Decoder {
    fn decode(&self, message: &mut DltMessage, silent: bool);
}

/// Decoder that leaves messages untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughDecoder;

impl Decoder for PassThroughDecoder {
    fn decode(&self, _message: &mut DltMessage, _silent: bool) {}
}

/// One decoding plugin.
pub trait DecoderPlugin {
    /// Plugin name for diagnostics.
    fn name(&self) -> &str;

    /// Whether this plugin handles `message`.
    fn claims(&self, message: &DltMessage) -> bool;

    /// Decode `message` in place. Returns false when decoding failed and the
    /// message was left unchanged.
    fn decode_message(&self, message: &mut DltMessage, silent: bool) -> bool;
}

/// Ordered collection of decoder plugins.
#[derive(Default)]
pub struct PluginManager {
    plugins: Vec<Box<dyn DecoderPlugin>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, plugin: Box<dyn DecoderPlugin>) {
        tracing::debug!(plugin = plugin.name(), "Decoder plugin registered");
        self.plugins.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl Decoder for PluginManager {
    fn decode(&self, message: &mut DltMessage, silent: bool) {
        if let Some(plugin) = self.plugins.iter().find(|p| p.claims(message)) {
            if !plugin.decode_message(message, silent) {
                tracing::debug!(plugin = plugin.name(), "Plugin could not decode message");
            }
        }
    }
}

// =============================================================================
// Message catalog plugin
// =============================================================================

/// Decodes non-verbose messages by looking their message id up in a catalog.
///
/// A known message becomes verbose: a string argument with the catalog text,
/// followed by a raw argument holding the remaining payload bytes (if any).
pub struct MessageCatalogPlugin {
    entries: HashMap<u32, String>,

    /// Ids already reported as unknown, so each is logged once.
    unknown: RefCell<HashSet<u32>>,
}

impl MessageCatalogPlugin {
    pub fn new(entries: HashMap<u32, String>) -> Self {
        Self {
            entries,
            unknown: RefCell::new(HashSet::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DecoderPlugin for MessageCatalogPlugin {
    fn name(&self) -> &str {
        "message-catalog"
    }

    fn claims(&self, message: &DltMessage) -> bool {
        message.extended.is_some() && !message.is_verbose() && message.message_id().is_some()
    }

    fn decode_message(&self, message: &mut DltMessage, silent: bool) -> bool {
        let Some(id) = message.message_id() else {
            return false;
        };
        let Some(text) = self.entries.get(&id) else {
            if self.unknown.borrow_mut().insert(id) {
                if silent {
                    tracing::debug!(message_id = id, "Message id not in catalog");
                } else {
                    tracing::warn!(message_id = id, "Message id not in catalog");
                }
            }
            return false;
        };

        let big_endian = message.big_endian;
        let mut arguments = vec![Argument::string(text, big_endian)];
        if message.payload.len() > 4 {
            arguments.push(Argument::raw(&message.payload[4..], big_endian));
        }
        message.arguments = arguments;
        if let Some(ext) = message.extended.as_mut() {
            ext.verbose = true;
        }
        true
    }
}
