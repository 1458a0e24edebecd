use std::collections::HashMap;
use std::fmt;

use tracewire_frame::proto::BindServiceReply;

/// The consumer port methods this client knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsumerMethod {
    EnableTracing,
    DisableTracing,
    FreeBuffers,
    ReadBuffers,
    GetTraceStats,
}

impl ConsumerMethod {
    pub const ALL: [ConsumerMethod; 5] = [
        ConsumerMethod::EnableTracing,
        ConsumerMethod::DisableTracing,
        ConsumerMethod::FreeBuffers,
        ConsumerMethod::ReadBuffers,
        ConsumerMethod::GetTraceStats,
    ];

    /// Name as advertised in the daemon's method table.
    pub fn name(self) -> &'static str {
        match self {
            ConsumerMethod::EnableTracing => "EnableTracing",
            ConsumerMethod::DisableTracing => "DisableTracing",
            ConsumerMethod::FreeBuffers => "FreeBuffers",
            ConsumerMethod::ReadBuffers => "ReadBuffers",
            ConsumerMethod::GetTraceStats => "GetTraceStats",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.name() == name)
    }
}

impl fmt::Display for ConsumerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Remote methods and their ids, learned once from the bind reply.
///
/// The table keeps every advertised method, including ones this client
/// never calls, so diagnostics can show what the remote build offers.
#[derive(Debug, Clone)]
pub struct MethodTable {
    service_id: u32,
    methods: HashMap<String, u32>,
}

impl MethodTable {
    /// Build the table from a bind reply.
    ///
    /// Returns `None` for a reply that does not complete binding: not
    /// successful, no service id, or no methods. Entries with a zero id are
    /// dropped.
    pub fn from_reply(reply: &BindServiceReply) -> Option<Self> {
        if !reply.success || reply.service_id == 0 || reply.methods.is_empty() {
            return None;
        }
        let methods = reply
            .methods
            .iter()
            .filter(|info| info.id != 0)
            .map(|info| (info.name.clone(), info.id))
            .collect();
        Some(Self {
            service_id: reply.service_id,
            methods,
        })
    }

    pub fn service_id(&self) -> u32 {
        self.service_id
    }

    /// Id of a known consumer method, if the remote offers it.
    pub fn id_of(&self, method: ConsumerMethod) -> Option<u32> {
        self.methods.get(method.name()).copied()
    }

    pub fn supports(&self, method: ConsumerMethod) -> bool {
        self.id_of(method).is_some()
    }

    /// Advertised method names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
