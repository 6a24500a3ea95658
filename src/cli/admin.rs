use std::collections::BTreeSet;
use std::fs;

use crate::store::{SqliteStore, Store};
use crate::types::role::{MANAGER, parse_role_list};
use crate::types::{DistroMetadata, Principal, RoleSet, Subject, make_distro_id};

use super::commands::AdminCommands;
use super::{data_config, open_registry};

const ADMIN: &str = "admin";

pub fn run_init(
    data_dir: &str,
    username: Option<&str>,
    password: Option<&str>,
) -> anyhow::Result<()> {
    let config = data_config(data_dir);
    fs::create_dir_all(config.files_dir())?;

    let db_path = config.db_path();
    if db_path.exists() {
        anyhow::bail!("Server already initialized. Database exists at: {}", db_path.display());
    }

    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;
    println!("Initialized database at {}", db_path.display());

    if let Some(username) = username {
        let registry = open_registry(data_dir)?;
        let roles: RoleSet = [MANAGER.to_string()].into_iter().collect();
        registry.update_user(
            &Principal::new(ADMIN),
            username,
            password,
            None,
            Some(&roles),
        )?;
        println!("Created user '{username}' with the global manager role");
    }

    Ok(())
}

/// Parses a requirements file: one requirement per line, `#` comments and
/// blank lines skipped.
fn read_requirements(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn changed_label(changed: bool) -> &'static str {
    if changed { "updated" } else { "unchanged" }
}

pub async fn run_admin(command: AdminCommands) -> anyhow::Result<()> {
    let admin = Principal::new(ADMIN);

    match command {
        AdminCommands::Init {
            data_dir,
            username,
            password,
        } => run_init(&data_dir, username.as_deref(), password.as_deref())?,

        AdminCommands::UpdateUser {
            data_dir,
            username,
            password,
            email,
            roles,
        } => {
            let registry = open_registry(&data_dir)?;
            let roles = roles.as_deref().map(parse_role_list);
            let user = registry.update_user(
                &admin,
                &username,
                password.as_deref(),
                email.as_deref(),
                roles.as_ref(),
            )?;
            println!("User '{}' saved", user.username);
        }

        AdminCommands::UpdateGroup {
            data_dir,
            groupname,
            roles,
        } => {
            let registry = open_registry(&data_dir)?;
            let roles = roles.as_deref().map(parse_role_list);
            let group = registry.update_group(&admin, &groupname, roles.as_ref())?;
            println!("Group '{}' saved", group.groupname);
        }

        AdminCommands::SetGroups {
            data_dir,
            username,
            groups,
        } => {
            let registry = open_registry(&data_dir)?;
            let groups: BTreeSet<String> = groups.into_iter().collect();
            let changed = registry.set_groups(&admin, &username, &groups)?;
            println!("Groups for '{username}' {}", changed_label(changed));
        }

        AdminCommands::SetRoles {
            data_dir,
            distro,
            user,
            group,
            roles,
        } => {
            let registry = open_registry(&data_dir)?;
            let subject = Subject::from_parts(
                user.as_deref().unwrap_or_default(),
                group.as_deref().unwrap_or_default(),
            )?;
            let distro = distro.as_deref().map(make_distro_id);
            let changed = registry.set_roles(
                &admin,
                distro.as_deref(),
                &subject,
                &parse_role_list(&roles),
            )?;
            println!("Roles for {subject} {}", changed_label(changed));
        }

        AdminCommands::MakePublic { data_dir, distro } => {
            let registry = open_registry(&data_dir)?;
            let changed = registry.make_public(&admin, &make_distro_id(&distro))?;
            println!("Public access to '{distro}' {}", changed_label(changed));
        }

        AdminCommands::AddDistro {
            data_dir,
            name,
            owner,
            summary,
            description,
            home_page,
            version,
        } => {
            let registry = open_registry(&data_dir)?;
            let metadata = DistroMetadata {
                summary,
                description,
                home_page,
                version,
                ..Default::default()
            };
            let distro = registry.upsert_metadata(&Principal::new(owner), &name, metadata)?;
            println!("Distribution '{}' saved as {}", distro.name, distro.distro_id);
        }

        AdminCommands::AddFile {
            data_dir,
            distro,
            path,
        } => {
            let registry = open_registry(&data_dir)?;
            let Some(filename) = path.file_name().and_then(|f| f.to_str()) else {
                anyhow::bail!("Not a file: {}", path.display());
            };
            let data = fs::read(&path)?;
            let entry = registry.upload_file(&admin, &distro, filename, &data).await?;
            println!("Stored {}", entry.filename);
        }

        AdminCommands::AddPin {
            data_dir,
            distro,
            index,
            requirement,
        } => {
            let registry = open_registry(&data_dir)?;
            let pin = registry.add_pin(&admin, &make_distro_id(&distro), &index, &requirement)?;
            println!(
                "Pinned {}=={} in index '{index}'",
                pin.target_distro_id, pin.target_version
            );
        }

        AdminCommands::RemovePin {
            data_dir,
            distro,
            index,
            target,
        } => {
            let registry = open_registry(&data_dir)?;
            if !registry.remove_pin(&admin, &make_distro_id(&distro), &index, &target)? {
                anyhow::bail!("No pin of '{target}' in index '{index}'");
            }
            println!("Removed '{target}' from index '{index}'");
        }

        AdminCommands::SetupIndex {
            data_dir,
            distro,
            index,
            requirements,
            overwrite,
        } => {
            let registry = open_registry(&data_dir)?;
            let requirements = read_requirements(&fs::read_to_string(&requirements)?);
            let pins = registry.replace_index(
                &admin,
                &make_distro_id(&distro),
                &index,
                &requirements,
                overwrite,
            )?;
            println!("Index '{index}' now pins {} distributions", pins.len());
        }
    }

    Ok(())
}
