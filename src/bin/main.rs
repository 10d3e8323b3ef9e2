//! Roleconnect CLI - role connection administration over the file store
//!
//! Authoring:
//!   roleconnect list <guild>                                   → rules + protected roles
//!   roleconnect add <guild> <target> <give|remove> has:<id> lacks:<id> [--logic AND|OR]
//!   roleconnect remove <guild> <id>
//!   roleconnect toggle <guild> <id>
//!   roleconnect logic <guild> <id> <AND|OR>
//!   roleconnect protect <guild> <role>
//!   roleconnect unprotect <guild> <role>
//!
//! Dry run:
//!   roleconnect check <guild> --roles 10,11 [--bot]            → what process_member would do
//!
//! Storage: --root <dir> or ROLECONNECT_ROOT, else the local data dir.
//! Output is JSON; errors print {"error": ...} and exit 1.

use anyhow::{anyhow, bail, Context, Result};
use roleconnect::logging::init_logging;
use roleconnect::{
    Action, Condition, ConnectionManager, FileStore, GuildId, Logic, Member, MemoryPlatform, RoleId, RuleId, UserId,
};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::env;
use std::io::IsTerminal;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("roleconnect {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    if opts.command.is_none() {
        print_usage();
        return;
    }

    let pretty = opts.pretty || std::io::stdout().is_terminal();
    match run(&opts).await {
        Ok(output) => println!("{}", render(&output, pretty)),
        Err(e) => {
            eprintln!("{}", render(&json!({"error": format!("{:#}", e)}), pretty));
            std::process::exit(1);
        }
    }
}

fn render(value: &Value, pretty: bool) -> String {
    let rendered = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    rendered.unwrap_or_else(|_| value.to_string())
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    positional: Vec<String>,
    root: Option<String>,
    logic: Option<String>,
    roles: Option<String>,
    user: Option<String>,
    bot: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        let mut opts = ParsedArgs::default();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            let value = args.get(i + 1).cloned();
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--pretty" => opts.pretty = true,
                "--bot" => opts.bot = true,
                "--root" | "-r" => {
                    opts.root = value;
                    i += 1;
                }
                "--logic" | "-l" => {
                    opts.logic = value;
                    i += 1;
                }
                "--roles" => {
                    opts.roles = value;
                    i += 1;
                }
                "--user" | "-u" => {
                    opts.user = value;
                    i += 1;
                }
                _ if !arg.starts_with('-') => opts.positional.push(arg.clone()),
                _ => {} // Ignore unknown flags
            }
            i += 1;
        }

        if !opts.positional.is_empty() {
            opts.command = Some(opts.positional.remove(0));
        }
        opts
    }

    fn arg(&self, index: usize, name: &str) -> Result<&str> {
        self.positional
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("missing <{}>", name))
    }

    fn guild(&self) -> Result<GuildId> {
        let raw = self.arg(0, "guild")?;
        raw.parse::<GuildId>().with_context(|| format!("invalid guild id {:?}", raw))
    }

    fn role(&self, index: usize, name: &str) -> Result<RoleId> {
        let raw = self.arg(index, name)?;
        raw.parse::<RoleId>().with_context(|| format!("invalid role id {:?}", raw))
    }

    fn rule_id(&self, index: usize) -> Result<RuleId> {
        let raw = self.arg(index, "id")?;
        raw.parse::<RuleId>().with_context(|| format!("invalid rule id {:?}", raw))
    }
}

fn print_usage() {
    println!(
        r#"roleconnect - Role connection administration

USAGE:
    roleconnect <command> [args] [options]

COMMANDS:
    list <guild>                                List rules and protected roles
    add <guild> <target> <give|remove> <cond>...
                                                Add a rule; cond is has:<role> or lacks:<role>
    remove <guild> <id>                         Delete a rule
    toggle <guild> <id>                         Enable/disable a rule
    logic <guild> <id> <AND|OR>                 Change how conditions combine
    protect <guild> <role>                      Exempt holders of a role
    unprotect <guild> <role>                    Remove an exemption
    check <guild> --roles <ids>                 Dry run for a member holding <ids>

OPTIONS:
    --root, -r <dir>        Store directory (env: ROLECONNECT_ROOT)
    --logic, -l <AND|OR>    Logic for `add` (default: AND)
    --roles <id,id,...>     Member roles for `check`
    --user, -u <id>         Member id for `check` (default: 0)
    --bot                   Treat the `check` member as a bot
    --pretty                Pretty-print JSON
    --version, -V           Print version

EXAMPLES:
    # Give VIP (20) to donors (10) who are not muted (30)
    roleconnect add 42 20 give has:10 lacks:30

    # Never touch staff (99)
    roleconnect protect 42 99

    # What would happen to a donor?
    roleconnect check 42 --roles 10
"#
    );
}

async fn run(opts: &ParsedArgs) -> Result<Value> {
    let command = opts.command.as_deref().unwrap_or_default();
    let store = match &opts.root {
        Some(root) => FileStore::at(root),
        None => FileStore::open_default(),
    };
    let manager = ConnectionManager::new(Arc::new(store));

    match command {
        "list" | "ls" => cmd_list(&manager, opts).await,
        "add" => cmd_add(&manager, opts).await,
        "remove" | "rm" => cmd_remove(&manager, opts).await,
        "toggle" => cmd_toggle(&manager, opts).await,
        "logic" => cmd_logic(&manager, opts).await,
        "protect" => cmd_protect(&manager, opts, true).await,
        "unprotect" => cmd_protect(&manager, opts, false).await,
        "check" => cmd_check(&manager, opts).await,
        other => bail!("Unknown command: {}", other),
    }
}

async fn cmd_list(manager: &ConnectionManager, opts: &ParsedArgs) -> Result<Value> {
    let guild = opts.guild()?;
    let rules = manager.reload(guild).await;
    let connections: Vec<Value> = rules
        .connections
        .iter()
        .map(|rule| {
            let mut value = serde_json::to_value(rule).unwrap_or(Value::Null);
            if let Value::Object(map) = &mut value {
                map.insert("summary".into(), Value::String(rule.to_string()));
            }
            value
        })
        .collect();
    Ok(json!({"guild_id": guild, "connections": connections, "protected_roles": rules.protected}))
}

async fn cmd_add(manager: &ConnectionManager, opts: &ParsedArgs) -> Result<Value> {
    let guild = opts.guild()?;
    let target = opts.role(1, "target")?;
    let raw_action = opts.arg(2, "give|remove")?;
    let action = Action::from_str(raw_action).ok_or_else(|| anyhow!("invalid action {:?}", raw_action))?;
    let logic = match opts.logic.as_deref() {
        Some(raw) => Logic::from_str(raw).ok_or_else(|| anyhow!("invalid logic {:?}", raw))?,
        None => Logic::And,
    };

    let conditions = opts.positional[3..]
        .iter()
        .map(|raw| parse_condition(raw))
        .collect::<Result<Vec<_>>>()?;
    if conditions.is_empty() {
        bail!("at least one condition (has:<role> or lacks:<role>) is required");
    }

    let id = manager.add_connection(guild, target, action, conditions, logic).await?;
    Ok(json!({"added": id}))
}

async fn cmd_remove(manager: &ConnectionManager, opts: &ParsedArgs) -> Result<Value> {
    let guild = opts.guild()?;
    let id = opts.rule_id(1)?;
    if !manager.remove_connection(guild, id).await? {
        bail!("no rule #{} in guild {}", id, guild);
    }
    Ok(json!({"removed": id}))
}

async fn cmd_toggle(manager: &ConnectionManager, opts: &ParsedArgs) -> Result<Value> {
    let guild = opts.guild()?;
    let id = opts.rule_id(1)?;
    let enabled = manager
        .toggle_connection(guild, id)
        .await?
        .ok_or_else(|| anyhow!("no rule #{} in guild {}", id, guild))?;
    Ok(json!({"id": id, "enabled": enabled}))
}

async fn cmd_logic(manager: &ConnectionManager, opts: &ParsedArgs) -> Result<Value> {
    let guild = opts.guild()?;
    let id = opts.rule_id(1)?;
    let raw = opts.arg(2, "AND|OR")?;
    let logic = Logic::from_str(raw).ok_or_else(|| anyhow!("invalid logic {:?}", raw))?;
    if !manager.update_connection_logic(guild, id, logic).await? {
        bail!("no rule #{} in guild {}", id, guild);
    }
    Ok(json!({"id": id, "logic": logic}))
}

async fn cmd_protect(manager: &ConnectionManager, opts: &ParsedArgs, protect: bool) -> Result<Value> {
    let guild = opts.guild()?;
    let role = opts.role(1, "role")?;
    let changed = if protect {
        manager.add_protected_role(guild, role).await?
    } else {
        manager.remove_protected_role(guild, role).await?
    };
    Ok(json!({"role_id": role, "protected": protect, "changed": changed}))
}

/// Seed an in-memory guild with the member and every role the rules
/// mention, then run one pass against it.
async fn cmd_check(manager: &ConnectionManager, opts: &ParsedArgs) -> Result<Value> {
    let guild = opts.guild()?;
    let roles = parse_role_list(opts.roles.as_deref().unwrap_or_default())?;
    let user: UserId = match opts.user.as_deref() {
        Some(raw) => raw.parse::<UserId>().with_context(|| format!("invalid user id {:?}", raw))?,
        None => UserId(0),
    };

    let rules = manager.reload(guild).await;
    let platform = MemoryPlatform::new();
    platform.add_guild(guild);
    let mentioned = rules
        .connections
        .iter()
        .flat_map(|r| std::iter::once(r.target_role_id).chain(r.conditions.iter().map(|c| c.role_id)))
        .chain(rules.protected.iter().copied())
        .chain(roles.iter().copied());
    for role in mentioned {
        platform.create_role(guild, role, role.to_string());
    }

    let mut member = Member::new(guild, user).with_roles(roles);
    if opts.bot {
        member = member.as_bot();
    }
    platform.upsert_member(member.clone());

    let report = manager.process_member(&platform, &member).await;
    let after: BTreeSet<RoleId> = platform
        .member(guild, user)
        .map(|m| m.roles.into_iter().collect())
        .unwrap_or_default();
    Ok(json!({"report": report, "roles_after": after}))
}

fn parse_condition(raw: &str) -> Result<Condition> {
    let (kind, role) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("invalid condition {:?} (expected has:<role> or lacks:<role>)", raw))?;
    let role = role.parse::<RoleId>().with_context(|| format!("invalid role in condition {:?}", raw))?;
    match kind.trim().to_ascii_lowercase().as_str() {
        "has" => Ok(Condition::has(role)),
        "lacks" | "doesnt_have" | "not" => Ok(Condition::lacks(role)),
        other => bail!("invalid condition type {:?}", other),
    }
}

fn parse_role_list(raw: &str) -> Result<BTreeSet<RoleId>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<RoleId>().with_context(|| format!("invalid role id {:?}", s)))
        .collect()
}
