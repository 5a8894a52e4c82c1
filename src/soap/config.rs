use crate::soap::{ns, prefix};

/// Output settings for SOAP serialization
#[derive(Debug, Clone)]
pub struct XmlConfig {
    pub pretty: bool,
    pub indent_size: usize,
    pub xml_decl: bool,
    /// `(prefix, uri)` pairs declared on the root element, in order
    pub namespaces: Vec<(String, String)>,
}

impl Default for XmlConfig {
    fn default() -> Self {
        Self {
            pretty: false,
            indent_size: 2,
            xml_decl: true,
            namespaces: Vec::new(),
        }
    }
}

impl XmlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespaces used by MeF header and service messages
    pub fn mef() -> Self {
        Self::new()
            .namespace(prefix::SOAP_ENV, ns::SOAP_ENV)
            .namespace(prefix::MEF_HEADER, ns::MEF_HEADER)
            .namespace(prefix::MEF_MSI, ns::MEF_MSI)
            .namespace(prefix::MEF_TRANSMITTER, ns::MEF_TRANSMITTER)
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn xml_decl(mut self, decl: bool) -> Self {
        self.xml_decl = decl;
        self
    }

    /// Declare a namespace; a repeated prefix replaces the earlier URI
    pub fn namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let uri = uri.into();
        match self.namespaces.iter_mut().find(|(p, _)| *p == prefix) {
            Some(entry) => entry.1 = uri,
            None => self.namespaces.push((prefix, uri)),
        }
        self
    }
}
