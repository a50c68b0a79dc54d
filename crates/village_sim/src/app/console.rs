use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

use crate::intent::{Intent, SellQuantity, TargetRef};
use crate::inventory::ItemId;
use crate::world::{DoorId, NodeId, NpcId, SpotId, TileCoord};

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Intent(Intent),
    /// Hold further lines until the simulation clock has advanced this much.
    Wait(Duration),
    Status,
    View,
    Save,
    Load,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}. usage: {usage}")]
pub struct CommandParseError {
    pub reason: String,
    pub usage: String,
}

type ParseFn = dyn Fn(&[String]) -> Result<ConsoleCommand, CommandParseError> + Send + Sync;

struct CommandSpec {
    name: String,
    help: String,
    arg_schema: String,
    parse: Box<ParseFn>,
}

pub struct ConsoleCommandRegistry {
    specs: Vec<CommandSpec>,
    lookup_by_lower_name: HashMap<String, usize>,
}

impl Default for ConsoleCommandRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ConsoleCommandRegistry {
    pub fn new() -> Self {
        Self {
            specs: Vec::new(),
            lookup_by_lower_name: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let builtins: [(&str, &str, &str, fn(&[String]) -> _); 19] = [
            ("move", "Walk to a tile", "<x:i32> <y:i32>", parse_move),
            (
                "approach",
                "Walk next to an npc, node or spot, or onto a door",
                "<npc|node|spot|door> <id>",
                parse_approach,
            ),
            ("interact", "Use whatever is next to you", "", parse_interact),
            ("open_shop", "Open an adjacent npc's counter", "<npc_id>", parse_open_shop),
            ("close", "Close the open counter", "", parse_close),
            ("buy", "Buy a tool at the shop", "<item>", parse_buy),
            ("sell", "Sell to the open buyer", "<item> [qty|all]", parse_sell),
            ("deposit", "Move items into the bank", "<item> [qty]", parse_deposit),
            ("withdraw", "Take items out of the bank", "<item> [qty]", parse_withdraw),
            ("deposit_all", "Deposit every stack", "", parse_deposit_all),
            ("withdraw_all", "Withdraw until the inventory is full", "", parse_withdraw_all),
            ("reset", "Start a new game", "", parse_reset),
            ("wait", "Let the simulation run before the next line", "<ms:u64>", parse_wait),
            ("status", "Show area, tile, coins, inventory and skills", "", parse_status),
            ("view", "Print the renderer view as JSON", "", parse_view),
            ("save", "Write the save slot", "", parse_save),
            ("load", "Reload the save slot", "", parse_load),
            ("help", "List commands", "", parse_help),
            ("quit", "Save and exit", "", parse_quit),
        ];

        let mut registry = Self::new();
        for (name, help, arg_schema, parse) in builtins {
            let registered = registry.register(name, help, arg_schema, parse);
            debug_assert!(registered.is_ok(), "built-in command {name} failed to register");
        }
        registry
    }

    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        arg_schema: impl Into<String>,
        parse: F,
    ) -> Result<(), String>
    where
        F: Fn(&[String]) -> Result<ConsoleCommand, CommandParseError> + Send + Sync + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("command name cannot be empty".to_string());
        }
        let lower = name.to_ascii_lowercase();
        if self.lookup_by_lower_name.contains_key(&lower) {
            return Err(format!("duplicate command registration: {name}"));
        }

        self.specs.push(CommandSpec {
            name,
            help: help.into(),
            arg_schema: arg_schema.into(),
            parse: Box::new(parse),
        });
        self.lookup_by_lower_name
            .insert(lower, self.specs.len() - 1);
        Ok(())
    }

    /// Parses one input line. Blank lines and `#` comments yield `None`.
    pub fn parse_line(&self, line: &str) -> Result<Option<ConsoleCommand>, CommandParseError> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }

        let tokens = tokenize_line(trimmed).map_err(|reason| CommandParseError {
            reason,
            usage: "help".to_string(),
        })?;
        let Some((command_name, args)) = tokens.split_first() else {
            return Ok(None);
        };
        let lower = command_name.to_ascii_lowercase();
        let Some(spec) = self
            .lookup_by_lower_name
            .get(&lower)
            .and_then(|index| self.specs.get(*index))
        else {
            return Err(CommandParseError {
                reason: format!("unknown command '{command_name}'"),
                usage: "help".to_string(),
            });
        };
        (spec.parse)(args).map(Some)
    }

    /// One line per command, in registration order.
    pub fn help_lines(&self) -> Vec<String> {
        self.specs
            .iter()
            .map(|spec| {
                if spec.arg_schema.is_empty() {
                    format!("{} - {}", spec.name, spec.help)
                } else {
                    format!("{} {} - {}", spec.name, spec.arg_schema, spec.help)
                }
            })
            .collect()
    }
}

fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut seen_token_content = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                seen_token_content = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if seen_token_content {
                    tokens.push(std::mem::take(&mut current));
                    seen_token_content = false;
                }
            }
            _ => {
                current.push(ch);
                seen_token_content = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted string".to_string());
    }
    if seen_token_content {
        tokens.push(current);
    }
    Ok(tokens)
}

fn usage_error(reason: impl Into<String>, usage: &str) -> CommandParseError {
    CommandParseError {
        reason: reason.into(),
        usage: usage.to_string(),
    }
}

fn require_no_args(args: &[String], usage: &str) -> Result<(), CommandParseError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(usage_error("expected no arguments", usage))
    }
}

fn require_args(
    args: &[String],
    min: usize,
    max: usize,
    usage: &str,
) -> Result<(), CommandParseError> {
    if (min..=max).contains(&args.len()) {
        Ok(())
    } else if min == max {
        Err(usage_error(format!("expected {min} argument(s)"), usage))
    } else {
        Err(usage_error(
            format!("expected {min} to {max} arguments"),
            usage,
        ))
    }
}

fn parse_number<T: std::str::FromStr>(
    raw: &str,
    what: &str,
    usage: &str,
) -> Result<T, CommandParseError> {
    raw.parse()
        .map_err(|_| usage_error(format!("invalid {what} '{raw}'"), usage))
}

fn parse_quantity(args: &[String], usage: &str) -> Result<u32, CommandParseError> {
    match args.get(1) {
        None => Ok(1),
        Some(raw) => parse_number(raw, "quantity", usage),
    }
}

fn parse_move(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    const USAGE: &str = "move <x> <y>";
    require_args(args, 2, 2, USAGE)?;
    let x = parse_number(&args[0], "x", USAGE)?;
    let y = parse_number(&args[1], "y", USAGE)?;
    Ok(ConsoleCommand::Intent(Intent::MoveTo(TileCoord::new(x, y))))
}

fn parse_approach(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    const USAGE: &str = "approach <npc|node|spot|door> <id>";
    require_args(args, 2, 2, USAGE)?;
    let id = args[1].as_str();
    let target = match args[0].to_ascii_lowercase().as_str() {
        "npc" => TargetRef::Npc(NpcId::new(id)),
        "node" => TargetRef::Node(NodeId::new(id)),
        "spot" => TargetRef::Spot(SpotId::new(id)),
        "door" => TargetRef::Door(DoorId::new(id)),
        other => {
            return Err(usage_error(
                format!("unknown target kind '{other}' (expected npc|node|spot|door)"),
                USAGE,
            ))
        }
    };
    Ok(ConsoleCommand::Intent(Intent::Approach(target)))
}

fn parse_interact(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "interact")?;
    Ok(ConsoleCommand::Intent(Intent::Interact))
}

fn parse_open_shop(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_args(args, 1, 1, "open_shop <npc_id>")?;
    Ok(ConsoleCommand::Intent(Intent::OpenShop(NpcId::new(
        args[0].as_str(),
    ))))
}

fn parse_close(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "close")?;
    Ok(ConsoleCommand::Intent(Intent::CloseCounter))
}

fn parse_buy(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_args(args, 1, 1, "buy <item>")?;
    Ok(ConsoleCommand::Intent(Intent::Buy(ItemId::new(
        args[0].as_str(),
    ))))
}

fn parse_sell(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    const USAGE: &str = "sell <item> [qty|all]";
    require_args(args, 1, 2, USAGE)?;
    let quantity = match args.get(1).map(String::as_str) {
        Some(raw) if raw.eq_ignore_ascii_case("all") => SellQuantity::All,
        Some(raw) => SellQuantity::Units(parse_number(raw, "quantity", USAGE)?),
        None => SellQuantity::Units(1),
    };
    Ok(ConsoleCommand::Intent(Intent::Sell {
        item: ItemId::new(args[0].as_str()),
        quantity,
    }))
}

fn parse_deposit(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    const USAGE: &str = "deposit <item> [qty]";
    require_args(args, 1, 2, USAGE)?;
    Ok(ConsoleCommand::Intent(Intent::Deposit {
        item: ItemId::new(args[0].as_str()),
        quantity: parse_quantity(args, USAGE)?,
    }))
}

fn parse_withdraw(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    const USAGE: &str = "withdraw <item> [qty]";
    require_args(args, 1, 2, USAGE)?;
    Ok(ConsoleCommand::Intent(Intent::Withdraw {
        item: ItemId::new(args[0].as_str()),
        quantity: parse_quantity(args, USAGE)?,
    }))
}

fn parse_deposit_all(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "deposit_all")?;
    Ok(ConsoleCommand::Intent(Intent::DepositAll))
}

fn parse_withdraw_all(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "withdraw_all")?;
    Ok(ConsoleCommand::Intent(Intent::WithdrawAll))
}

fn parse_reset(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "reset")?;
    Ok(ConsoleCommand::Intent(Intent::Reset))
}

fn parse_wait(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    const USAGE: &str = "wait <ms>";
    require_args(args, 1, 1, USAGE)?;
    let ms: u64 = parse_number(&args[0], "milliseconds", USAGE)?;
    Ok(ConsoleCommand::Wait(Duration::from_millis(ms)))
}

fn parse_status(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "status")?;
    Ok(ConsoleCommand::Status)
}

fn parse_view(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "view")?;
    Ok(ConsoleCommand::View)
}

fn parse_save(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "save")?;
    Ok(ConsoleCommand::Save)
}

fn parse_load(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "load")?;
    Ok(ConsoleCommand::Load)
}

fn parse_help(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "help")?;
    Ok(ConsoleCommand::Help)
}

fn parse_quit(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "quit")?;
    Ok(ConsoleCommand::Quit)
}
