//! The four built-in transport profiles and the `--profiles=<file>` XML
//! loader (§4.E/§6). Grounded on the original `profiles.c` XML schema:
//! `<routino-profiles><profile name=".." transport="..">` containing
//! `<speeds>`/`<preferences>`/`<properties>`/`<restrictions>` children.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

use routino_common::highway::Highway;
use routino_common::property::Property;
use routino_common::transport::Transport;
use routino_router::{Optimisation, Profile};

fn attr(e: &quick_xml::events::BytesStart, name: &str) -> Option<String> {
    e.attributes().flatten().find(|a| a.key.as_ref() == name.as_bytes()).map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Parses a Profile XML file into named, transport-tagged profiles. Every
/// profile still needs [`Profile::normalize`] called against the target
/// database before use.
pub fn load_profiles_xml(path: &Path) -> Result<HashMap<String, Profile>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading profiles file {}", path.display()))?;
    let mut reader = Reader::from_str(&text);
    reader.config_mut().trim_text = true;

    let mut profiles = HashMap::new();
    let mut current: Option<Profile> = None;

    loop {
        match reader.read_event().with_context(|| format!("parsing {}", path.display()))? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match name.as_str() {
                    "profile" => {
                        let profile_name = attr(&e, "name").context("profile element missing name attribute")?;
                        let transport_name = attr(&e, "transport").context("profile element missing transport attribute")?;
                        let transport = Transport::from_tag(&transport_name).with_context(|| format!("unknown transport {transport_name}"))?;
                        current = Some(Profile::new(profile_name, transport, Optimisation::Shortest));
                    }
                    "speed" => {
                        let p = current.as_mut().context("<speed> outside <profile>")?;
                        let highway = attr(&e, "highway").context("<speed> missing highway attribute")?;
                        let kph: f64 = attr(&e, "kph").context("<speed> missing kph attribute")?.parse()?;
                        let h = Highway::from_tag(&highway).with_context(|| format!("unknown highway {highway}"))?;
                        p.speed[h.index()] = kph;
                    }
                    "preference" => {
                        let p = current.as_mut().context("<preference> outside <profile>")?;
                        let highway = attr(&e, "highway").context("<preference> missing highway attribute")?;
                        let pct: f64 = attr(&e, "percent").context("<preference> missing percent attribute")?.parse()?;
                        let h = Highway::from_tag(&highway).with_context(|| format!("unknown highway {highway}"))?;
                        p.highway_pref[h.index()] = pct;
                    }
                    "property" => {
                        let p = current.as_mut().context("<property> outside <profile>")?;
                        let ty = attr(&e, "type").context("<property> missing type attribute")?;
                        let pct: f64 = attr(&e, "percent").context("<property> missing percent attribute")?.parse()?;
                        let prop = property_from_tag(&ty).with_context(|| format!("unknown property {ty}"))?;
                        p.props_yes[prop.index()] = pct;
                    }
                    "oneway" => {
                        let p = current.as_mut().context("<oneway> outside <profile>")?;
                        p.obey_oneway = attr(&e, "obey").context("<oneway> missing obey attribute")?.trim() != "0";
                    }
                    "turns" => {
                        let p = current.as_mut().context("<turns> outside <profile>")?;
                        p.obey_turns = attr(&e, "obey").context("<turns> missing obey attribute")?.trim() != "0";
                    }
                    "weight" => set_limit(&mut current, &e, "weight", |p, v| p.weight = v)?,
                    "height" => set_limit(&mut current, &e, "height", |p, v| p.height = v)?,
                    "width" => set_limit(&mut current, &e, "width", |p, v| p.width = v)?,
                    "length" => set_limit(&mut current, &e, "length", |p, v| p.length = v)?,
                    _ => {}
                }
            }
            Event::End(e) if e.name().as_ref() == b"profile" => {
                if let Some(p) = current.take() {
                    profiles.insert(p.name.clone(), p);
                }
            }
            _ => {}
        }
    }

    Ok(profiles)
}

fn set_limit(current: &mut Option<Profile>, e: &quick_xml::events::BytesStart, tag: &str, set: impl FnOnce(&mut Profile, f64)) -> Result<()> {
    let p = current.as_mut().with_context(|| format!("<{tag}> outside <profile>"))?;
    let limit: f64 = attr(e, "limit").with_context(|| format!("<{tag}> missing limit attribute"))?.parse()?;
    set(p, limit);
    Ok(())
}

fn property_from_tag(value: &str) -> Option<Property> {
    Property::ALL.into_iter().find(|p| p.name() == value)
}

/// The four profiles the router ships without a `--profiles=<file>`
/// override: foot, horse, bicycle, motorcar. Approximate percentages in the
/// spirit of the original's shipped defaults, not a byte-for-byte
/// reproduction (the original XML data file wasn't part of the retrieved
/// source).
pub fn built_in_profiles() -> HashMap<String, Profile> {
    let mut map = HashMap::new();
    map.insert("foot".to_string(), foot_profile());
    map.insert("horse".to_string(), horse_profile());
    map.insert("bicycle".to_string(), bicycle_profile());
    map.insert("motorcar".to_string(), motorcar_profile());
    map
}

fn foot_profile() -> Profile {
    let mut p = Profile::new("foot", Transport::Foot, Optimisation::Shortest);
    set_prefs(
        &mut p,
        &[
            (Highway::Path, 100.0, 5.0),
            (Highway::Steps, 100.0, 3.0),
            (Highway::Residential, 80.0, 5.0),
            (Highway::Service, 80.0, 5.0),
            (Highway::Unclassified, 70.0, 5.0),
            (Highway::Tertiary, 60.0, 5.0),
            (Highway::Secondary, 40.0, 5.0),
            (Highway::Primary, 20.0, 5.0),
            (Highway::Track, 90.0, 5.0),
        ],
    );
    p.props_yes[Property::FootRoute.index()] = 70.0;
    p
}

fn horse_profile() -> Profile {
    let mut p = Profile::new("horse", Transport::Horse, Optimisation::Shortest);
    set_prefs(
        &mut p,
        &[
            (Highway::Path, 90.0, 8.0),
            (Highway::Track, 100.0, 8.0),
            (Highway::Residential, 70.0, 8.0),
            (Highway::Unclassified, 60.0, 8.0),
            (Highway::Tertiary, 40.0, 8.0),
        ],
    );
    p
}

fn bicycle_profile() -> Profile {
    let mut p = Profile::new("bicycle", Transport::Bicycle, Optimisation::Shortest);
    set_prefs(
        &mut p,
        &[
            (Highway::Cycleway, 100.0, 20.0),
            (Highway::Residential, 90.0, 20.0),
            (Highway::Service, 80.0, 15.0),
            (Highway::Unclassified, 80.0, 20.0),
            (Highway::Tertiary, 70.0, 20.0),
            (Highway::Secondary, 40.0, 20.0),
            (Highway::Primary, 20.0, 20.0),
            (Highway::Track, 50.0, 15.0),
            (Highway::Path, 60.0, 15.0),
        ],
    );
    p.props_yes[Property::BicycleRoute.index()] = 70.0;
    p.props_yes[Property::Paved.index()] = 60.0;
    p
}

fn motorcar_profile() -> Profile {
    let mut p = Profile::new("motorcar", Transport::Motorcar, Optimisation::Shortest);
    set_prefs(
        &mut p,
        &[
            (Highway::Motorway, 100.0, 120.0),
            (Highway::Trunk, 100.0, 100.0),
            (Highway::Primary, 90.0, 80.0),
            (Highway::Secondary, 80.0, 70.0),
            (Highway::Tertiary, 70.0, 60.0),
            (Highway::Unclassified, 60.0, 50.0),
            (Highway::Residential, 50.0, 30.0),
            (Highway::Service, 40.0, 20.0),
        ],
    );
    p.props_yes[Property::Paved.index()] = 90.0;
    p
}

fn set_prefs(p: &mut Profile, entries: &[(Highway, f64, f64)]) {
    for &(h, pref, speed) in entries {
        p.highway_pref[h.index()] = pref;
        p.speed[h.index()] = speed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;
    use routino_common::transport::Transports;
    use routino_graph::compact::ways::WaysHeader;

    #[test]
    fn every_built_in_profile_normalizes_against_a_permissive_database() {
        let mut header = WaysHeader::zeroed();
        header.allow_union = Transports::all().bits();
        header.highways_union = 0xffff;
        header.props_union = 0xff;

        for (name, mut profile) in built_in_profiles() {
            profile.normalize(&header).unwrap_or_else(|e| panic!("{name} failed to normalize: {e}"));
        }
    }

    #[test]
    fn loads_a_minimal_profile_xml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.xml");
        std::fs::write(
            &path,
            r#"<?xml version="1.0"?>
<routino-profiles>
  <profile name="custom-bike" transport="bicycle">
    <speeds>
      <speed highway="residential" kph="18"/>
    </speeds>
    <preferences>
      <preference highway="residential" percent="100"/>
    </preferences>
    <properties>
      <property type="paved" percent="80"/>
    </properties>
    <restrictions>
      <oneway obey="1"/>
      <turns obey="0"/>
      <weight limit="0"/>
    </restrictions>
  </profile>
</routino-profiles>
"#,
        )
        .unwrap();

        let profiles = load_profiles_xml(&path).unwrap();
        let p = profiles.get("custom-bike").unwrap();
        assert_eq!(p.transport, Transport::Bicycle);
        assert_eq!(p.speed[Highway::Residential.index()], 18.0);
        assert_eq!(p.highway_pref[Highway::Residential.index()], 100.0);
        assert!(!p.obey_turns);
    }
}
