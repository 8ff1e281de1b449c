use serde::{ser::SerializeTuple, Serialize, Serializer};

/// A deferred tracking call recorded during a request.
///
/// Every argument is kept as its JSON text, ready to be embedded in a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedCall {
    /// API method name, e.g. `"track"`.
    pub call_type: String,
    /// JSON-encoded arguments.
    pub args: Vec<String>,
}

impl QueuedCall {
    /// Render as a client-side `mpq.push([...]);` statement.
    pub fn to_javascript(&self) -> String {
        let mut items = Vec::with_capacity(self.args.len() + 1);
        // Serializing a &str never fails.
        items.push(serde_json::to_string(&self.call_type).unwrap_or_default());
        items.extend(self.args.iter().cloned());
        format!("mpq.push([{}]);", items.join(","))
    }
}

// Serializes as `[call_type, [args...]]`.
impl Serialize for QueuedCall {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.call_type)?;
        tuple.serialize_element(&self.args)?;
        tuple.end()
    }
}

/// Ordered queue of tracking calls for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EventQueue {
    calls: Vec<QueuedCall>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, call: QueuedCall) {
        self.calls.push(call);
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueuedCall> {
        self.calls.iter()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    /// Remove and return every queued call, leaving the queue empty.
    pub fn take(&mut self) -> Vec<QueuedCall> {
        std::mem::take(&mut self.calls)
    }

    /// Render the queue as JavaScript statements, one per line.
    pub fn to_javascript(&self) -> String {
        self.calls
            .iter()
            .map(QueuedCall::to_javascript)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl<'a> IntoIterator for &'a EventQueue {
    type Item = &'a QueuedCall;
    type IntoIter = std::slice::Iter<'a, QueuedCall>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_call() -> QueuedCall {
        QueuedCall {
            call_type: "track".to_owned(),
            args: vec![r#""Signed Up""#.to_owned(), r#"{"plan":"pro"}"#.to_owned()],
        }
    }

    #[test]
    fn serializes_as_nested_arrays() {
        let mut queue = EventQueue::new();
        queue.push(track_call());

        assert_eq!(
            serde_json::to_value(&queue).unwrap(),
            serde_json::json!([["track", ["\"Signed Up\"", "{\"plan\":\"pro\"}"]]])
        );
    }

    #[test]
    fn renders_javascript() {
        let mut queue = EventQueue::new();
        queue.push(track_call());
        queue.push(QueuedCall {
            call_type: "identify".to_owned(),
            args: vec![r#""user-1""#.to_owned()],
        });

        assert_eq!(
            queue.to_javascript(),
            "mpq.push([\"track\",\"Signed Up\",{\"plan\":\"pro\"}]);\nmpq.push([\"identify\",\"user-1\"]);"
        );
    }

    #[test]
    fn take_drains_queue() {
        let mut queue = EventQueue::new();
        queue.push(track_call());

        let calls = queue.take();

        assert_eq!(calls, vec![track_call()]);
        assert!(queue.is_empty());
    }
}
