use {anyhow::Result, clap::Subcommand};

use {
    partyline_common::{CommunityId, MemberId},
    partyline_store::{GroupRecord, Store},
};

#[derive(Subcommand)]
pub enum InspectAction {
    /// List personal rooms of a community.
    Rooms {
        #[arg(long)]
        community: u64,
    },
    /// List published parties of a community.
    Parties {
        #[arg(long)]
        community: u64,
        /// Print full configs as JSON lines.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List a member's saved drafts.
    Drafts {
        #[arg(long)]
        community: u64,
        #[arg(long)]
        member: u64,
    },
}

pub async fn handle_inspect(store: &dyn Store, action: InspectAction) -> Result<()> {
    match action {
        InspectAction::Rooms { community } => rooms(store, CommunityId(community)).await,
        InspectAction::Parties { community, json } => {
            parties(store, CommunityId(community), json).await
        },
        InspectAction::Drafts { community, member } => {
            drafts(store, CommunityId(community), MemberId(member)).await
        },
    }
}

async fn rooms(store: &dyn Store, community: CommunityId) -> Result<()> {
    let rooms = store.list_rooms(community).await?;
    if rooms.is_empty() {
        println!("No personal rooms.");
        return Ok(());
    }
    println!("{:>5}  {:<20} {:<20} CREATED", "ORDER", "CHANNEL", "OWNER");
    for r in &rooms {
        println!(
            "{:>5}  {:<20} {:<20} {}",
            r.order_index, r.resource_id, r.owner, r.created_at
        );
    }
    Ok(())
}

fn party_line(g: &GroupRecord) -> String {
    let c = &g.config;
    format!(
        "{:<20} {:<20} {:<12} {:>4} {:>3} {}",
        g.resource_id,
        g.owner,
        c.mode.as_deref().unwrap_or("-"),
        c.size,
        c.looking_for_count(),
        if c.private { "private" } else { "open" },
    )
}

async fn parties(store: &dyn Store, community: CommunityId, json: bool) -> Result<()> {
    let groups = store.list_groups(community).await?;
    if json {
        for g in &groups {
            println!("{}", serde_json::to_string(&g.config)?);
        }
        return Ok(());
    }
    if groups.is_empty() {
        println!("No parties.");
        return Ok(());
    }
    println!(
        "{:<20} {:<20} {:<12} {:>4} {:>3} ACCESS",
        "CHANNEL", "OWNER", "MODE", "SIZE", "LF"
    );
    for g in &groups {
        println!("{}", party_line(g));
    }
    Ok(())
}

async fn drafts(store: &dyn Store, community: CommunityId, member: MemberId) -> Result<()> {
    let drafts = store.list_drafts(community, member).await?;
    if drafts.is_empty() {
        println!("No saved drafts.");
        return Ok(());
    }
    println!("{:>4}  {:<24} {:<12} UPDATED", "SLOT", "NAME", "MODE");
    for d in &drafts {
        println!(
            "{:>4}  {:<24} {:<12} {}",
            d.slot,
            d.name,
            d.config.mode.as_deref().unwrap_or("-"),
            d.updated_at
        );
    }
    Ok(())
}
