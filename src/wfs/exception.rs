use std::fmt;

use crate::xml::Element;

/// One `Exception` of an OWS `ExceptionReport`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WfsException {
    pub code: Option<String>,
    pub locator: Option<String>,
    pub texts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionReport {
    pub exceptions: Vec<WfsException>,
}

impl ExceptionReport {
    /// Read an `ExceptionReport` root element; any other root yields `None`
    pub fn from_element(root: &Element) -> Option<Self> {
        if root.local_name() != "ExceptionReport" {
            return None;
        }

        let exceptions = root
            .children_named("Exception")
            .map(|e| WfsException {
                code: e.attr("exceptionCode").map(str::to_string),
                locator: e.attr("locator").map(str::to_string),
                texts: e
                    .children_named("ExceptionText")
                    .map(|t| t.text().to_string())
                    .collect(),
            })
            .collect();

        Some(Self { exceptions })
    }
}

impl fmt::Display for ExceptionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .exceptions
            .iter()
            .map(|e| {
                let mut part = e.code.clone().unwrap_or_else(|| "Exception".to_string());
                if let Some(locator) = &e.locator {
                    part.push_str(&format!(" ({})", locator));
                }
                if !e.texts.is_empty() {
                    part.push_str(&format!(": {}", e.texts.join("; ")));
                }
                part
            })
            .collect();
        f.write_str(&parts.join(", "))
    }
}
