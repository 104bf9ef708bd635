//! Bundled schema checker.
//!
//! Covers the structural rules exported artifacts are expected to satisfy:
//! asset header, extension declaration, index references, node hierarchy
//! and buffer sizes. Codes and severities follow glTF-Validator so reports
//! read the same whichever checker produced them.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;

use super::resolver::decode_data_uri;
use super::{
    glb, severity, ResourceResolver, SchemaValidator, ValidationMessage, ValidationReport,
    ValidatorError,
};
use crate::document::{escape_pointer_segment, strip_utf8_bom};

/// Texture-info properties of a material, as pointer suffixes.
const MATERIAL_TEXTURES: &[&[&str]] = &[
    &["pbrMetallicRoughness", "baseColorTexture"],
    &["pbrMetallicRoughness", "metallicRoughnessTexture"],
    &["normalTexture"],
    &["occlusionTexture"],
    &["emissiveTexture"],
];

/// In-process stand-in for the external validation library.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinSchemaValidator;

#[async_trait]
impl SchemaValidator for BuiltinSchemaValidator {
    async fn validate_bytes(
        &self,
        bytes: &[u8],
        resolver: &dyn ResourceResolver,
    ) -> Result<ValidationReport, ValidatorError> {
        let (json, bin) = split_input(bytes)?;
        let mut checker = Checker::default();

        let root: Value = match serde_json::from_slice(json) {
            Ok(root) => root,
            Err(e) => {
                checker.error("", "INVALID_JSON", e.to_string());
                return Ok(checker.finish());
            }
        };
        if !root.is_object() {
            checker.error(
                "",
                "TYPE_MISMATCH",
                "Type mismatch. Document root is not an 'object'.",
            );
            return Ok(checker.finish());
        }

        checker.check_asset(&root);
        checker.check_extensions(&root);
        checker.check_references(&root);
        checker.check_hierarchy(&root);

        let lengths = fetch_resources(&root, resolver).await?;
        checker.check_buffers(&root, bin, &lengths);
        checker.check_buffer_views(&root);

        Ok(checker.finish())
    }
}

/// JSON text and optional binary chunk of the input.
fn split_input(bytes: &[u8]) -> Result<(&[u8], Option<&[u8]>), ValidatorError> {
    if glb::is_glb(bytes) {
        let container = glb::read_container(bytes)
            .map_err(|e| ValidatorError::UnrecognizedInput(e.to_string()))?;
        return Ok((container.json, container.bin));
    }

    let text = strip_utf8_bom(bytes);
    match text.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') | Some(b'[') => Ok((text, None)),
        Some(_) => Err(ValidatorError::UnrecognizedInput(
            "neither JSON text nor a GLB container".to_string(),
        )),
        None => Err(ValidatorError::UnrecognizedInput("empty input".to_string())),
    }
}

/// Byte length of every buffer and image payload, keyed by entity pointer.
///
/// External URIs are read concurrently through the resolver; the first
/// failure aborts validation.
async fn fetch_resources(
    root: &Value,
    resolver: &dyn ResourceResolver,
) -> Result<HashMap<String, usize>, ValidatorError> {
    let mut lengths = HashMap::new();
    let mut external = Vec::new();

    for key in ["buffers", "images"] {
        for (i, entity) in array(root, key).iter().enumerate() {
            let Some(uri) = entity.get("uri").and_then(Value::as_str) else {
                continue;
            };
            let pointer = format!("/{}/{}", key, i);
            match uri.strip_prefix("data:") {
                Some(payload) => {
                    lengths.insert(pointer, decode_data_uri(uri, payload)?.len());
                }
                None => external.push((pointer, uri)),
            }
        }
    }

    let fetched = try_join_all(external.iter().map(|(_, uri)| resolver.resolve(uri))).await?;
    lengths.extend(
        external
            .into_iter()
            .zip(fetched)
            .map(|((pointer, _), bytes)| (pointer, bytes.len())),
    );
    Ok(lengths)
}

fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(*key))
}

#[derive(Default)]
struct Checker {
    messages: Vec<ValidationMessage>,
}

impl Checker {
    fn push(&mut self, pointer: &str, code: &str, message: impl Into<String>, severity: u8) {
        self.messages.push(ValidationMessage {
            pointer: pointer.to_string(),
            message: message.into(),
            code: code.to_string(),
            severity,
        });
    }

    fn error(&mut self, pointer: &str, code: &str, message: impl Into<String>) {
        self.push(pointer, code, message, severity::ERROR);
    }

    fn finish(self) -> ValidationReport {
        ValidationReport::from_messages(self.messages)
    }

    fn check_asset(&mut self, root: &Value) {
        let Some(asset) = root.get("asset").filter(|a| a.is_object()) else {
            self.error("/", "UNDEFINED_PROPERTY", "Property 'asset' must be defined.");
            return;
        };
        match asset.get("version").and_then(Value::as_str) {
            None => self.error(
                "/asset",
                "UNDEFINED_PROPERTY",
                "Property 'version' must be defined.",
            ),
            Some(version) => {
                let major = version.split('.').next().unwrap_or_default();
                if major != "2" {
                    self.error(
                        "/asset/version",
                        "UNKNOWN_ASSET_MAJOR_VERSION",
                        format!("Unknown glTF major asset version: {}.", major),
                    );
                }
            }
        }
    }

    fn check_extensions(&mut self, root: &Value) {
        let declared: Vec<&str> = array(root, "extensionsUsed")
            .iter()
            .filter_map(Value::as_str)
            .collect();

        let mut present = Vec::new();
        collect_extension_objects(root, String::new(), &mut present);

        for (name, pointer) in &present {
            if !declared.contains(&name.as_str()) {
                self.error(
                    pointer,
                    "UNDECLARED_EXTENSION",
                    "Extension is not declared in extensionsUsed.",
                );
            }
        }

        for (i, name) in declared.iter().enumerate() {
            if !present.iter().any(|(used, _)| used == name) {
                self.push(
                    &format!("/extensionsUsed/{}", i),
                    "UNUSED_EXTENSION",
                    format!("Extension '{}' is declared but not used.", name),
                    severity::INFO,
                );
            }
        }

        for (i, required) in array(root, "extensionsRequired").iter().enumerate() {
            if let Some(name) = required.as_str().filter(|n| !declared.contains(n)) {
                self.error(
                    &format!("/extensionsRequired/{}", i),
                    "UNUSED_EXTENSION_REQUIRED",
                    format!("Unused extension '{}' cannot be required.", name),
                );
            }
        }
    }

    fn check_index(&mut self, value: Option<&Value>, pointer: &str, len: usize) {
        let Some(value) = value else {
            return;
        };
        match value.as_u64() {
            Some(index) if (index as usize) < len => {}
            Some(index) => self.error(
                pointer,
                "UNRESOLVED_REFERENCE",
                format!("Unresolved reference: {}.", index),
            ),
            None => self.error(
                pointer,
                "TYPE_MISMATCH",
                format!("Type mismatch. Property value {} is not a 'integer'.", value),
            ),
        }
    }

    fn check_index_list(&mut self, value: Option<&Value>, pointer: &str, len: usize) {
        if let Some(list) = value.and_then(Value::as_array) {
            for (j, item) in list.iter().enumerate() {
                self.check_index(Some(item), &format!("{}/{}", pointer, j), len);
            }
        }
    }

    fn check_index_map(&mut self, value: Option<&Value>, pointer: &str, len: usize) {
        if let Some(map) = value.and_then(Value::as_object) {
            for (key, item) in map {
                self.check_index(Some(item), &format!("{}/{}", pointer, key), len);
            }
        }
    }

    fn check_references(&mut self, root: &Value) {
        let count = |key: &str| array(root, key).len();
        let nodes = count("nodes");
        let accessors = count("accessors");

        self.check_index(root.get("scene"), "/scene", count("scenes"));

        for (i, scene) in array(root, "scenes").iter().enumerate() {
            self.check_index_list(scene.get("nodes"), &format!("/scenes/{}/nodes", i), nodes);
        }

        for (i, node) in array(root, "nodes").iter().enumerate() {
            let at = format!("/nodes/{}", i);
            self.check_index_list(node.get("children"), &format!("{}/children", at), nodes);
            self.check_index(node.get("mesh"), &format!("{}/mesh", at), count("meshes"));
            self.check_index(node.get("camera"), &format!("{}/camera", at), count("cameras"));
            self.check_index(node.get("skin"), &format!("{}/skin", at), count("skins"));
        }

        for (i, mesh) in array(root, "meshes").iter().enumerate() {
            for (j, primitive) in array(mesh, "primitives").iter().enumerate() {
                let at = format!("/meshes/{}/primitives/{}", i, j);
                self.check_index_map(
                    primitive.get("attributes"),
                    &format!("{}/attributes", at),
                    accessors,
                );
                self.check_index(primitive.get("indices"), &format!("{}/indices", at), accessors);
                self.check_index(
                    primitive.get("material"),
                    &format!("{}/material", at),
                    count("materials"),
                );
                for (k, target) in array(primitive, "targets").iter().enumerate() {
                    self.check_index_map(Some(target), &format!("{}/targets/{}", at, k), accessors);
                }
            }
        }

        for (i, material) in array(root, "materials").iter().enumerate() {
            for path in MATERIAL_TEXTURES {
                if let Some(info) = lookup(material, path) {
                    let at = format!("/materials/{}/{}/index", i, path.join("/"));
                    self.check_index(info.get("index"), &at, count("textures"));
                }
            }
        }

        for (i, texture) in array(root, "textures").iter().enumerate() {
            let at = format!("/textures/{}", i);
            self.check_index(texture.get("source"), &format!("{}/source", at), count("images"));
            self.check_index(texture.get("sampler"), &format!("{}/sampler", at), count("samplers"));
        }

        for key in ["images", "accessors"] {
            for (i, entity) in array(root, key).iter().enumerate() {
                self.check_index(
                    entity.get("bufferView"),
                    &format!("/{}/{}/bufferView", key, i),
                    count("bufferViews"),
                );
            }
        }

        for (i, view) in array(root, "bufferViews").iter().enumerate() {
            self.check_index(view.get("buffer"), &format!("/bufferViews/{}/buffer", i), count("buffers"));
        }

        for (i, skin) in array(root, "skins").iter().enumerate() {
            let at = format!("/skins/{}", i);
            self.check_index_list(skin.get("joints"), &format!("{}/joints", at), nodes);
            self.check_index(skin.get("skeleton"), &format!("{}/skeleton", at), nodes);
            self.check_index(
                skin.get("inverseBindMatrices"),
                &format!("{}/inverseBindMatrices", at),
                accessors,
            );
        }

        for (i, animation) in array(root, "animations").iter().enumerate() {
            let at = format!("/animations/{}", i);
            let samplers = array(animation, "samplers").len();
            for (j, channel) in array(animation, "channels").iter().enumerate() {
                self.check_index(
                    channel.get("sampler"),
                    &format!("{}/channels/{}/sampler", at, j),
                    samplers,
                );
                self.check_index(
                    lookup(channel, &["target", "node"]),
                    &format!("{}/channels/{}/target/node", at, j),
                    nodes,
                );
            }
            for (k, sampler) in array(animation, "samplers").iter().enumerate() {
                for key in ["input", "output"] {
                    self.check_index(
                        sampler.get(key),
                        &format!("{}/samplers/{}/{}", at, k, key),
                        accessors,
                    );
                }
            }
        }
    }

    fn check_hierarchy(&mut self, root: &Value) {
        let nodes = array(root, "nodes");
        let mut parent: Vec<Option<usize>> = vec![None; nodes.len()];

        for (i, node) in nodes.iter().enumerate() {
            for (j, child) in array(node, "children").iter().enumerate() {
                let Some(child) = child.as_u64().map(|c| c as usize) else {
                    continue;
                };
                let at = format!("/nodes/{}/children/{}", i, j);
                if child == i {
                    self.error(&at, "NODE_LOOP", "Node is a part of a node loop.");
                } else if let Some(slot) = parent.get_mut(child) {
                    if slot.is_some() {
                        self.error(
                            &at,
                            "NODE_PARENT_OVERRIDE",
                            format!("Value overrides parent of node {}.", child),
                        );
                    } else {
                        *slot = Some(i);
                    }
                }
            }
        }
    }

    fn check_buffers(&mut self, root: &Value, bin: Option<&[u8]>, lengths: &HashMap<String, usize>) {
        for (i, buffer) in array(root, "buffers").iter().enumerate() {
            let at = format!("/buffers/{}", i);
            let Some(declared) = buffer.get("byteLength").and_then(Value::as_u64) else {
                self.error(&at, "UNDEFINED_PROPERTY", "Property 'byteLength' must be defined.");
                continue;
            };

            let actual = if buffer.get("uri").is_some() {
                lengths.get(&at).copied()
            } else {
                match bin.filter(|_| i == 0) {
                    Some(bin) => Some(bin.len()),
                    None => {
                        self.error(
                            &at,
                            "BUFFER_MISSING_GLB_DATA",
                            "Buffer refers to an unresolved GLB binary chunk.",
                        );
                        None
                    }
                }
            };

            if let Some(actual) = actual.filter(|a| (*a as u64) < declared) {
                self.error(
                    &format!("{}/byteLength", at),
                    "BUFFER_EXTERNAL_BYTELENGTH_MISMATCH",
                    format!(
                        "Actual data length {} is less than the declared buffer byteLength {}.",
                        actual, declared
                    ),
                );
            }
        }
    }

    fn check_buffer_views(&mut self, root: &Value) {
        let buffers = array(root, "buffers");
        for (i, view) in array(root, "bufferViews").iter().enumerate() {
            let at = format!("/bufferViews/{}", i);
            let Some(length) = view.get("byteLength").and_then(Value::as_u64) else {
                self.error(&at, "UNDEFINED_PROPERTY", "Property 'byteLength' must be defined.");
                continue;
            };
            let offset = view.get("byteOffset").and_then(Value::as_u64).unwrap_or(0);
            let capacity = view
                .get("buffer")
                .and_then(Value::as_u64)
                .and_then(|b| buffers.get(b as usize))
                .and_then(|b| b.get("byteLength"))
                .and_then(Value::as_u64);

            let Some(capacity) = capacity else {
                continue;
            };
            match offset.checked_add(length) {
                Some(end) if end <= capacity => {}
                end => self.error(
                    &format!("{}/byteLength", at),
                    "BUFFER_VIEW_TOO_LONG",
                    format!(
                        "BufferView does not fit buffer ({}) byteLength ({}).",
                        end.map_or_else(|| "overflow".to_string(), |e| e.to_string()),
                        capacity
                    ),
                ),
            }
        }
    }
}

/// Every `extensions` entry in the tree, as `(name, pointer)`.
///
/// `extras` subtrees are application data and are not searched.
fn collect_extension_objects(value: &Value, pointer: String, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let at = format!("{}/{}", pointer, escape_pointer_segment(key));
                match (key.as_str(), child) {
                    ("extras", _) => {}
                    ("extensions", Value::Object(extensions)) => {
                        for (name, payload) in extensions {
                            let ext_at = format!("{}/{}", at, escape_pointer_segment(name));
                            out.push((name.clone(), ext_at.clone()));
                            collect_extension_objects(payload, ext_at, out);
                        }
                    }
                    _ => collect_extension_objects(child, at, out),
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_extension_objects(item, format!("{}/{}", pointer, i), out);
            }
        }
        _ => {}
    }
}
