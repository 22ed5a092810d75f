use crate::resolver::Resolved;
use crate::validate::ValidateError;
use log::debug;
use serde_json::Value;

impl Resolved {
    /// Fills in missing object members from the root schema's property
    /// defaults. Non-object instances are left alone, as are properties
    /// the root lists as required; the pass does not recurse into
    /// subschemas or follow references.
    pub fn apply_defaults(&self, instance: &mut Value) -> Result<(), ValidateError> {
        let members = match instance {
            Value::Object(members) => members,
            _ => return Ok(()),
        };

        let root = self.schema();
        let properties = match &root.properties {
            Some(properties) => properties,
            None => return Ok(()),
        };

        for (name, sub_schema) in properties {
            if root.is_required(name) || members.contains_key(name) {
                continue;
            }
            if let Some(default) = &sub_schema.default {
                if !default.is_null() {
                    debug!("filling in default for property {:?}", name);
                    members.insert(name.clone(), default.clone());
                }
            }
        }
        Ok(())
    }
}
