use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tessera_types::{Hasher, Message};

use crate::{Context, PieceStore};

/// The result of handling one inbound message: whether a reply is owed, and if so, what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOutcome {
    /// `true` if `payload` should be sent back to the peer.
    pub needs_reply: bool,
    /// The reply to send, present iff `needs_reply`.
    pub payload: Option<Message>,
}

impl HandlerOutcome {
    /// No reply is owed.
    pub fn none() -> Self {
        Self {
            needs_reply: false,
            payload: None,
        }
    }

    /// `payload` should be sent back to the peer.
    pub fn reply(payload: Message) -> Self {
        Self {
            needs_reply: true,
            payload: Some(payload),
        }
    }
}

/// Handles one inbound message kind (C6).
///
/// New message kinds are added by implementing this trait and registering an instance with
/// a [`HandlerResolver`]; the exchanger itself never inspects message contents.
#[async_trait]
pub trait Handler<H: Hasher>: Send + Sync {
    /// Handles `message`, optionally mutating `context` (e.g. the shared file's hash tree)
    /// and optionally producing a reply.
    async fn handle(&self, context: &Context<H>, message: &Message) -> anyhow::Result<HandlerOutcome>;
}

/// Dispatches an inbound message to the handler registered for its tag.
pub struct HandlerResolver<H: Hasher> {
    handlers: HashMap<&'static str, Box<dyn Handler<H>>>,
}

impl<H: Hasher> HandlerResolver<H> {
    /// An empty resolver; use [`Self::with_handler`] to register handlers.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for messages whose [`Message::tag`] equals `tag`.
    pub fn with_handler(mut self, tag: &'static str, handler: impl Handler<H> + 'static) -> Self {
        self.handlers.insert(tag, Box::new(handler));
        self
    }

    /// Resolves and runs the handler for `message`'s tag.
    ///
    /// A message with no registered handler is logged and treated as a no-op reply, rather
    /// than an error: the dispatch table is meant to grow without every peer needing to
    /// understand every kind immediately.
    pub async fn dispatch(&self, context: &Context<H>, message: &Message) -> anyhow::Result<HandlerOutcome> {
        match self.handlers.get(message.tag()) {
            Some(handler) => handler.handle(context, message).await,
            None => {
                tracing::warn!("no handler registered for message kind `{}`", message.tag());
                Ok(HandlerOutcome::none())
            }
        }
    }
}

impl<H: Hasher> Default for HandlerResolver<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Serving-side handler for [`Message::PieceRequest`].
///
/// Looks the piece up in the local hash tree and piece store; if either is missing, no reply
/// is sent (the requester will simply never hear back for that piece).
pub struct PieceRequestHandler<Store> {
    piece_store: Arc<Store>,
}

impl<Store: PieceStore> PieceRequestHandler<Store> {
    /// Builds a handler backed by `piece_store`.
    pub fn new(piece_store: Arc<Store>) -> Self {
        Self { piece_store }
    }
}

#[async_trait]
impl<H, Store> Handler<H> for PieceRequestHandler<Store>
where
    H: Hasher,
    Store: PieceStore,
{
    async fn handle(&self, context: &Context<H>, message: &Message) -> anyhow::Result<HandlerOutcome> {
        let index = match message {
            Message::PieceRequest { index } => *index,
            _ => anyhow::bail!("PieceRequestHandler received a non-PieceRequest message"),
        };

        let leaf_hash = context.shared_file.with_tree(|tree| tree.get_piece_hash(index));

        if leaf_hash.is_empty() {
            return Ok(HandlerOutcome::none());
        }

        let bytes = match self.piece_store.read_piece(&context.shared_file.hash, index).await? {
            Some(bytes) => bytes,
            None => return Ok(HandlerOutcome::none()),
        };

        let path = context.shared_file.with_tree(|tree| tree.get_path(index));

        Ok(HandlerOutcome::reply(Message::PieceResponse {
            index,
            bytes,
            leaf_hash,
            path,
        }))
    }
}

/// Downloading-side handler for [`Message::PieceResponse`].
///
/// Recomputes the piece's hash locally rather than trusting the wire-supplied `leaf_hash`,
/// then verifies it against the tree's root via [`tessera_merkle::MerkleTree::try_add`]. A
/// piece that fails verification is dropped silently: no side effect, no reply.
pub struct PieceResponseHandler<Store> {
    piece_store: Arc<Store>,
}

impl<Store: PieceStore> PieceResponseHandler<Store> {
    /// Builds a handler backed by `piece_store`.
    pub fn new(piece_store: Arc<Store>) -> Self {
        Self { piece_store }
    }
}

#[async_trait]
impl<H, Store> Handler<H> for PieceResponseHandler<Store>
where
    H: Hasher,
    Store: PieceStore,
{
    async fn handle(&self, context: &Context<H>, message: &Message) -> anyhow::Result<HandlerOutcome> {
        let (index, bytes, path) = match message {
            Message::PieceResponse { index, bytes, path, .. } => (*index, bytes.clone(), path.clone()),
            _ => anyhow::bail!("PieceResponseHandler received a non-PieceResponse message"),
        };

        let item_hash = H::hash(&bytes);
        let added = context.shared_file.with_tree(|tree| tree.try_add(index, item_hash, &path));

        if !added {
            tracing::debug!("piece {index} failed Merkle verification; dropping");
            return Ok(HandlerOutcome::none());
        }

        self.piece_store.write_piece(&context.shared_file.hash, index, &bytes).await?;

        Ok(HandlerOutcome::none())
    }
}
