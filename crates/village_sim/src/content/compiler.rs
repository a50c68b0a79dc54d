use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use roxmltree::{Document, Node};
use thiserror::Error;

use crate::action::ActionKind;
use crate::inventory::{ItemCatalog, ItemDef, ItemId};

use super::database::{ContentDatabase, Tuning};
use super::hashing::{collect_xml_files, hash_xml_inputs};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ", line={}, column={}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDef,
    MissingRequiredItem,
}

#[derive(Debug, Clone, Error)]
#[error("{code:?}: {message} (file={}{})", .file_path.display(), display_location(.location))]
pub struct ContentError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

fn display_location(location: &Option<SourceLocation>) -> String {
    location.map(|loc| loc.to_string()).unwrap_or_default()
}

#[derive(Debug, Default)]
struct ParsedDefs {
    items: Vec<ItemDef>,
    tuning: Option<Tuning>,
}

/// Compiles every `*.xml` under `dir` (sorted by relative path) into one
/// database. Each item may be defined once and at most one `<TuningDef>` may
/// exist across all files.
pub fn compile_content_dir(dir: &Path) -> Result<ContentDatabase, ContentError> {
    let files = collect_xml_files(dir).map_err(|error| ContentError {
        code: ContentErrorCode::ReadFile,
        message: error.to_string(),
        file_path: dir.to_path_buf(),
        location: None,
    })?;

    let mut items = Vec::<ItemDef>::new();
    let mut tuning: Option<(Tuning, PathBuf)> = None;
    for (_, xml_file) in files {
        let raw = fs::read_to_string(&xml_file).map_err(|source| ContentError {
            code: ContentErrorCode::ReadFile,
            message: format!("failed to read XML file: {source}"),
            file_path: xml_file.clone(),
            location: None,
        })?;
        let parsed = parse_defs_document(&xml_file, &raw)?;
        for def in parsed.items {
            if items.iter().any(|existing| existing.id == def.id) {
                return Err(ContentError {
                    code: ContentErrorCode::DuplicateDef,
                    message: format!("duplicate ItemDef '{}'; each defName may appear once", def.id),
                    file_path: xml_file.clone(),
                    location: None,
                });
            }
            items.push(def);
        }
        if let Some(parsed_tuning) = parsed.tuning {
            if let Some((_, first_file)) = &tuning {
                return Err(ContentError {
                    code: ContentErrorCode::DuplicateDef,
                    message: format!(
                        "second <TuningDef>; the first is in {}",
                        first_file.display()
                    ),
                    file_path: xml_file.clone(),
                    location: None,
                });
            }
            tuning = Some((parsed_tuning, xml_file.clone()));
        }
    }

    let catalog = ItemCatalog::new(items);
    validate_required_items(&catalog, dir)?;

    let hash = hash_xml_inputs(dir).map_err(|error| ContentError {
        code: ContentErrorCode::ReadFile,
        message: error.to_string(),
        file_path: dir.to_path_buf(),
        location: None,
    })?;
    let tuning = tuning.map(|(tuning, _)| tuning).unwrap_or_default();
    Ok(ContentDatabase::from_parts(catalog, tuning, hash.hash_hex))
}

fn validate_required_items(catalog: &ItemCatalog, dir: &Path) -> Result<(), ContentError> {
    for kind in ActionKind::ALL {
        for (id, must_stack) in [(kind.tool(), false), (kind.yield_item(), true)] {
            let id = ItemId::new(id);
            let message = match catalog.get(&id) {
                None => format!("missing ItemDef '{id}' required by {kind:?}"),
                Some(def) if def.stackable != must_stack => format!(
                    "ItemDef '{id}' must have stackable={must_stack} for {kind:?}"
                ),
                Some(_) => continue,
            };
            return Err(ContentError {
                code: ContentErrorCode::MissingRequiredItem,
                message,
                file_path: dir.to_path_buf(),
                location: None,
            });
        }
    }
    Ok(())
}

fn parse_defs_document(file_path: &Path, raw: &str) -> Result<ParsedDefs, ContentError> {
    let doc = Document::parse(raw).map_err(|error| ContentError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(error_at_node(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            file_path,
            &doc,
            root,
        ));
    }

    let mut parsed = ParsedDefs::default();
    for child in root.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            "ItemDef" => parsed.items.push(parse_item_def(file_path, &doc, child)?),
            "TuningDef" => {
                if parsed.tuning.is_some() {
                    return Err(error_at_node(
                        ContentErrorCode::DuplicateDef,
                        "only one <TuningDef> is allowed".to_string(),
                        file_path,
                        &doc,
                        child,
                    ));
                }
                parsed.tuning = Some(parse_tuning_def(file_path, &doc, child)?);
            }
            other => {
                return Err(error_at_node(
                    ContentErrorCode::UnknownDefType,
                    format!("unsupported def type <{other}>; expected <ItemDef> or <TuningDef>"),
                    file_path,
                    &doc,
                    child,
                ))
            }
        }
    }
    Ok(parsed)
}

fn parse_item_def(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<ItemDef, ContentError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut def_name: Option<String> = None;
    let mut label: Option<String> = None;
    let mut stackable: Option<bool> = None;
    let mut buy_price: Option<u64> = None;
    let mut sell_price: Option<u64> = None;

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        check_duplicate_field(&mut seen_fields, &field_name, "ItemDef", file_path, doc, field)?;
        match field_name.as_str() {
            "defName" => def_name = Some(required_text(file_path, doc, field, "defName")?),
            "label" => label = Some(required_text(file_path, doc, field, "label")?),
            "stackable" => stackable = Some(parse_field(file_path, doc, field, "stackable")?),
            "buyPrice" => buy_price = Some(parse_field(file_path, doc, field, "buyPrice")?),
            "sellPrice" => sell_price = Some(parse_field(file_path, doc, field, "sellPrice")?),
            _ => return Err(unknown_field(&field_name, "ItemDef", file_path, doc, field)),
        }
    }

    let Some(def_name) = def_name else {
        return Err(missing_field("defName", "ItemDef", file_path, doc, node));
    };
    let Some(label) = label else {
        return Err(missing_field("label", "ItemDef", file_path, doc, node));
    };
    let Some(stackable) = stackable else {
        return Err(missing_field("stackable", "ItemDef", file_path, doc, node));
    };

    Ok(ItemDef {
        id: ItemId::new(def_name),
        label,
        stackable,
        buy_price,
        sell_price,
    })
}

fn parse_tuning_def(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<Tuning, ContentError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut tuning = Tuning::default();

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        check_duplicate_field(&mut seen_fields, &field_name, "TuningDef", file_path, doc, field)?;
        let name = field_name.as_str();
        match name {
            "chopMs" => tuning.chop_ms = parse_field(file_path, doc, field, name)?,
            "fishMs" => tuning.fish_ms = parse_field(file_path, doc, field, name)?,
            "mineMs" => tuning.mine_ms = parse_field(file_path, doc, field, name)?,
            "treeRespawnMs" => tuning.tree_respawn_ms = parse_field(file_path, doc, field, name)?,
            "rockRespawnMs" => tuning.rock_respawn_ms = parse_field(file_path, doc, field, name)?,
            "fishSpotRespawnMs" => {
                tuning.fish_spot_respawn_ms = parse_field(file_path, doc, field, name)?
            }
            "xpChop" => tuning.xp_chop = parse_field(file_path, doc, field, name)?,
            "xpFish" => tuning.xp_fish = parse_field(file_path, doc, field, name)?,
            "xpMine" => tuning.xp_mine = parse_field(file_path, doc, field, name)?,
            "inventoryCapacity" => {
                let capacity: usize = parse_field(file_path, doc, field, name)?;
                if capacity == 0 {
                    return Err(error_at_node(
                        ContentErrorCode::InvalidValue,
                        "inventoryCapacity must be >= 1".to_string(),
                        file_path,
                        doc,
                        field,
                    ));
                }
                tuning.inventory_capacity = capacity;
            }
            "bankCapacity" => {
                let capacity: usize = parse_field(file_path, doc, field, name)?;
                tuning.bank_capacity = (capacity > 0).then_some(capacity);
            }
            "startingCoins" => tuning.starting_coins = parse_field(file_path, doc, field, name)?,
            "moveSpeed" => {
                let speed: f32 = parse_field(file_path, doc, field, name)?;
                if !speed.is_finite() || speed <= 0.0 {
                    return Err(error_at_node(
                        ContentErrorCode::InvalidValue,
                        "moveSpeed must be finite and > 0".to_string(),
                        file_path,
                        doc,
                        field,
                    ));
                }
                tuning.move_speed = speed;
            }
            "maxTickMs" => tuning.max_tick_ms = parse_field(file_path, doc, field, name)?,
            _ => return Err(unknown_field(name, "TuningDef", file_path, doc, field)),
        }
    }

    Ok(tuning)
}

fn check_duplicate_field(
    seen_fields: &mut HashSet<String>,
    field_name: &str,
    def_type: &str,
    file_path: &Path,
    doc: &Document<'_>,
    field: Node<'_, '_>,
) -> Result<(), ContentError> {
    if seen_fields.insert(field_name.to_string()) {
        return Ok(());
    }
    Err(error_at_node(
        ContentErrorCode::DuplicateField,
        format!("duplicate field <{field_name}> in <{def_type}>"),
        file_path,
        doc,
        field,
    ))
}

fn parse_field<T: FromStr>(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    field_name: &str,
) -> Result<T, ContentError> {
    let value = required_text(file_path, doc, node, field_name)?;
    value.parse::<T>().map_err(|_| {
        error_at_node(
            ContentErrorCode::InvalidValue,
            format!("{field_name} '{value}' is not a valid value"),
            file_path,
            doc,
            node,
        )
    })
}

fn required_text(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    field_name: &str,
) -> Result<String, ContentError> {
    let value = node.text().map(str::trim).unwrap_or_default().to_string();
    if value.is_empty() {
        return Err(error_at_node(
            ContentErrorCode::MissingField,
            format!("field <{field_name}> must not be empty"),
            file_path,
            doc,
            node,
        ));
    }
    Ok(value)
}

fn unknown_field(
    field_name: &str,
    def_type: &str,
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> ContentError {
    error_at_node(
        ContentErrorCode::UnknownField,
        format!("unknown field <{field_name}> in <{def_type}>"),
        file_path,
        doc,
        node,
    )
}

fn missing_field(
    field_name: &str,
    def_type: &str,
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> ContentError {
    error_at_node(
        ContentErrorCode::MissingField,
        format!("missing required field <{field_name}> in <{def_type}>"),
        file_path,
        doc,
        node,
    )
}

fn error_at_node(
    code: ContentErrorCode,
    message: String,
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> ContentError {
    let pos = doc.text_pos_at(node.range().start);
    ContentError {
        code,
        message,
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;

    const REQUIRED_ITEMS: &str = r#"
        <ItemDef><defName>log</defName><label>Logs</label><stackable>true</stackable><sellPrice>1</sellPrice></ItemDef>
        <ItemDef><defName>fish</defName><label>Raw fish</label><stackable>true</stackable><sellPrice>2</sellPrice></ItemDef>
        <ItemDef><defName>ore</defName><label>Copper ore</label><stackable>true</stackable><sellPrice>3</sellPrice></ItemDef>
        <ItemDef><defName>axe</defName><label>Bronze axe</label><stackable>false</stackable><buyPrice>5</buyPrice></ItemDef>
        <ItemDef><defName>fishing_rod</defName><label>Fishing rod</label><stackable>false</stackable><buyPrice>8</buyPrice></ItemDef>
        <ItemDef><defName>pickaxe</defName><label>Bronze pickaxe</label><stackable>false</stackable><buyPrice>10</buyPrice></ItemDef>
    "#;

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write");
    }

    fn items_file(dir: &Path, extra: &str) {
        write_file(
            &dir.join("items.xml"),
            &format!("<Defs>{REQUIRED_ITEMS}{extra}</Defs>"),
        );
    }

    #[test]
    fn items_and_tuning_compile_across_files() {
        let temp = TempDir::new().expect("temp");
        items_file(temp.path(), "");
        write_file(
            &temp.path().join("nested").join("tuning.xml"),
            r#"<Defs><TuningDef><chopMs>500</chopMs><bankCapacity>40</bankCapacity><fishSpotRespawnMs>0</fishSpotRespawnMs></TuningDef></Defs>"#,
        );
        let db = compile_content_dir(temp.path()).expect("compile");
        assert_eq!(db.tuning().chop_ms, 500);
        assert_eq!(db.tuning().bank_capacity, Some(40));
        assert_eq!(db.tuning().fish_spot_respawn(), None);
        assert_eq!(db.tuning().fish_ms, Tuning::default().fish_ms);
        let axe = db.items().get(&ItemId::new("axe")).expect("axe");
        assert!(!axe.stackable);
        assert_eq!(axe.buy_price, Some(5));
        assert_eq!(db.content_hash().len(), 64);
    }

    #[test]
    fn missing_tuning_uses_defaults() {
        let temp = TempDir::new().expect("temp");
        items_file(temp.path(), "");
        let db = compile_content_dir(temp.path()).expect("compile");
        assert_eq!(db.tuning(), &Tuning::default());
    }

    #[test]
    fn missing_def_name_reports_file_and_location() {
        let temp = TempDir::new().expect("temp");
        items_file(
            temp.path(),
            "<ItemDef><label>X</label><stackable>true</stackable></ItemDef>",
        );
        let err = compile_content_dir(temp.path()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::MissingField);
        assert!(err.file_path.ends_with("items.xml"));
        assert!(err.location.is_some());
        assert!(err.to_string().contains("line="));
    }

    #[test]
    fn unknown_and_duplicate_fields_error() {
        let temp = TempDir::new().expect("temp");
        write_file(
            &temp.path().join("tuning.xml"),
            "<Defs><TuningDef><mood>calm</mood></TuningDef></Defs>",
        );
        items_file(temp.path(), "");
        let err = compile_content_dir(temp.path()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnknownField);

        write_file(
            &temp.path().join("tuning.xml"),
            "<Defs><TuningDef><chopMs>1</chopMs><chopMs>2</chopMs></TuningDef></Defs>",
        );
        let err = compile_content_dir(temp.path()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::DuplicateField);
    }

    #[test]
    fn invalid_values_error() {
        let temp = TempDir::new().expect("temp");
        items_file(temp.path(), "");
        write_file(
            &temp.path().join("tuning.xml"),
            "<Defs><TuningDef><moveSpeed>-1</moveSpeed></TuningDef></Defs>",
        );
        let err = compile_content_dir(temp.path()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::InvalidValue);

        write_file(
            &temp.path().join("tuning.xml"),
            "<Defs><TuningDef><chopMs>soon</chopMs></TuningDef></Defs>",
        );
        let err = compile_content_dir(temp.path()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn malformed_xml_reports_location() {
        let temp = TempDir::new().expect("temp");
        write_file(&temp.path().join("items.xml"), "<Defs><ItemDef></Defs>");
        let err = compile_content_dir(temp.path()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::XmlMalformed);
        assert!(err.location.is_some());
    }

    #[test]
    fn duplicate_item_and_second_tuning_error() {
        let temp = TempDir::new().expect("temp");
        items_file(
            temp.path(),
            "<ItemDef><defName>log</defName><label>Again</label><stackable>true</stackable></ItemDef>",
        );
        let err = compile_content_dir(temp.path()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::DuplicateDef);

        items_file(temp.path(), "");
        write_file(&temp.path().join("a.xml"), "<Defs><TuningDef/></Defs>");
        write_file(&temp.path().join("b.xml"), "<Defs><TuningDef/></Defs>");
        let err = compile_content_dir(temp.path()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::DuplicateDef);
    }

    #[test]
    fn wrong_root_and_unknown_def_type_error() {
        let temp = TempDir::new().expect("temp");
        write_file(&temp.path().join("items.xml"), "<Items/>");
        let err = compile_content_dir(temp.path()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::InvalidRoot);

        write_file(&temp.path().join("items.xml"), "<Defs><MonsterDef/></Defs>");
        let err = compile_content_dir(temp.path()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnknownDefType);
    }

    #[test]
    fn tools_and_yields_must_be_defined() {
        let temp = TempDir::new().expect("temp");
        write_file(
            &temp.path().join("items.xml"),
            r#"<Defs><ItemDef><defName>log</defName><label>Logs</label><stackable>true</stackable></ItemDef></Defs>"#,
        );
        let err = compile_content_dir(temp.path()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::MissingRequiredItem);
    }

    #[test]
    fn shipped_assets_match_builtin_content() {
        let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("assets")
            .join("base");
        let db = compile_content_dir(&base).expect("compile shipped assets");
        let builtin = ContentDatabase::builtin();
        assert_eq!(db.items(), builtin.items());
        assert_eq!(db.tuning(), builtin.tuning());
    }
}
