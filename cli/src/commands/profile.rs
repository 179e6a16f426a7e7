use anyhow::Result;

use korjournal_core::models::{UpdateUserProfile, UserProfile};

use super::Logbook;

fn print_profile(p: &UserProfile) {
    println!("Name:        {}", p.name);
    println!("E-mail:      {}", p.email);
    println!("Employee id: {}", p.employee_id);
    println!("Department:  {}", p.department);
    println!("Account:     {}", p.account);
    println!("Company:     {}", p.company);
    println!("Reference:   {}", p.reference);
    println!("Purpose:     {}", p.purpose);
    if let (Some(from), Some(to)) = (&p.default_from_address, &p.default_to_address) {
        println!("Last route:  {from} - {to}");
    }
}

pub(crate) fn cmd_profile_show(svc: &Logbook, json: bool) -> Result<()> {
    let profile = svc.profile();
    if json {
        println!("{}", serde_json::to_string_pretty(profile)?);
    } else {
        print_profile(profile);
    }
    Ok(())
}

pub(crate) fn cmd_profile_set(
    svc: &mut Logbook,
    update: UpdateUserProfile,
    addresses: (Option<String>, Option<String>),
    json: bool,
) -> Result<()> {
    let mut profile = svc.update_profile(update)?;

    let (from, to) = addresses;
    if from.is_some() || to.is_some() {
        let from = from.or(profile.default_from_address).unwrap_or_default();
        let to = to.or(profile.default_to_address).unwrap_or_default();
        svc.set_default_addresses(&from, &to)?;
        profile = svc.profile().clone();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        print_profile(&profile);
    }
    Ok(())
}
