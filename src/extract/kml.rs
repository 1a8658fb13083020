//! Placemark extraction from KML documents.
//!
//! The XML is first reduced to a small tree of containers (kml/Document/Folder) and
//! placemark leaves, then walked depth-first in document order.

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use super::address::extract_address;
use crate::error::{Error, Result};
use crate::models::{Coordinates, Place, UNNAMED_PLACE};

/// Container element kinds that may hold placemarks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Kml,
    Document,
    Folder,
}

impl ContainerKind {
    fn from_element(name: &str) -> Option<Self> {
        match name {
            "Document" => Some(ContainerKind::Document),
            "Folder" => Some(ContainerKind::Folder),
            _ => None,
        }
    }
}

/// Raw placemark fields as found in the document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPlacemark {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Text of Point/coordinates, "lng,lat[,alt]"
    pub point: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Container {
        kind: ContainerKind,
        children: Vec<Node>,
    },
    Placemark(RawPlacemark),
}

impl Node {
    /// Depth-first visit of every placemark, in document order.
    pub fn visit_placemarks<F>(&self, visitor: &mut F)
    where
        F: FnMut(&RawPlacemark),
    {
        match self {
            Node::Placemark(pm) => visitor(pm),
            Node::Container { children, .. } => {
                for child in children {
                    child.visit_placemarks(visitor);
                }
            }
        }
    }

    pub fn placemark_count(&self) -> usize {
        let mut count = 0;
        self.visit_placemarks(&mut |_| count += 1);
        count
    }
}

/// Parser stack frame
enum Frame {
    Container {
        kind: ContainerKind,
        children: Vec<Node>,
    },
    Placemark {
        /// Element path below the Placemark element
        path: Vec<String>,
        raw: RawPlacemark,
    },
    /// Element we don't care about, including everything inside it
    Skip,
}

/// Parse a KML document into its container tree.
///
/// Returns `None` when the document has no `kml` root element.
pub fn parse_document(xml: &str) -> Result<Option<Node>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                open_element(&mut stack, name, root.is_some());
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                open_element(&mut stack, name, root.is_some());
                close_element(&mut stack, &mut root);
            }
            Ok(Event::End(_)) => close_element(&mut stack, &mut root),
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|err| {
                    Error::Format(format!(
                        "invalid text at position {}: {}",
                        reader.buffer_position(),
                        err
                    ))
                })?;
                push_text(&mut stack, &text);
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                push_text(&mut stack, &text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Format(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(Error::Format("unexpected end of KML document".to_string()));
    }

    Ok(root)
}

fn open_element(stack: &mut Vec<Frame>, name: String, seen_root: bool) {
    let frame = match stack.last_mut() {
        None if name == "kml" && !seen_root => Frame::Container {
            kind: ContainerKind::Kml,
            children: Vec::new(),
        },
        None => Frame::Skip,
        Some(Frame::Skip) => Frame::Skip,
        Some(Frame::Placemark { path, .. }) => {
            path.push(name);
            return;
        }
        Some(Frame::Container { .. }) => {
            if name == "Placemark" {
                Frame::Placemark {
                    path: Vec::new(),
                    raw: RawPlacemark::default(),
                }
            } else if let Some(kind) = ContainerKind::from_element(&name) {
                Frame::Container {
                    kind,
                    children: Vec::new(),
                }
            } else {
                Frame::Skip
            }
        }
    };
    stack.push(frame);
}

fn close_element(stack: &mut Vec<Frame>, root: &mut Option<Node>) {
    if let Some(Frame::Placemark { path, .. }) = stack.last_mut() {
        if path.pop().is_some() {
            return;
        }
    }

    let node = match stack.pop() {
        Some(Frame::Container { kind, children }) => Node::Container { kind, children },
        Some(Frame::Placemark { raw, .. }) => Node::Placemark(raw),
        Some(Frame::Skip) | None => return,
    };

    match stack.last_mut() {
        Some(Frame::Container { children, .. }) => children.push(node),
        None => *root = Some(node),
        _ => {}
    }
}

fn push_text(stack: &mut [Frame], text: &str) {
    let Some(Frame::Placemark { path, raw }) = stack.last_mut() else {
        return;
    };

    let slot = match path.as_slice() {
        [field] if field == "name" => &mut raw.name,
        [field] if field == "description" => &mut raw.description,
        [point, coords] if point == "Point" && coords == "coordinates" => &mut raw.point,
        _ => return,
    };
    slot.get_or_insert_with(String::new).push_str(text);
}

/// Parse a Point coordinate tuple "lng,lat[,alt]".
///
/// Longitude comes first in KML; only the first tuple is used.
pub fn parse_point(text: &str) -> Option<Coordinates> {
    let tuple = text.split_whitespace().next()?;
    let mut parts = tuple.split(',');
    let lng: f64 = parts.next()?.trim().parse().ok()?;
    let lat: f64 = parts.next()?.trim().parse().ok()?;
    let coordinates = Coordinates::new(lat, lng);
    coordinates.is_valid().then_some(coordinates)
}

/// Convert a raw placemark into a place candidate.
///
/// Placemarks without a point and without a recognizable address are dropped.
pub fn placemark_to_place(raw: &RawPlacemark) -> Option<Place> {
    let name = raw
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(UNNAMED_PLACE);
    let description = raw.description.as_deref().map(str::trim).unwrap_or("");

    let mut place = Place::new(name, description);

    if let Some(coordinates) = raw.point.as_deref().and_then(parse_point) {
        place.coordinates = Some(coordinates);
        return Some(place);
    }

    let address = extract_address(description)?;
    place.address = Some(address);
    place.needs_geocode = true;
    Some(place)
}

/// Extract place candidates from a KML document, in document order.
pub fn extract_places(xml: &str) -> Result<Vec<Place>> {
    let Some(root) = parse_document(xml)? else {
        debug!("Document has no kml root element");
        return Ok(Vec::new());
    };

    let mut places = Vec::new();
    let mut dropped = 0usize;
    root.visit_placemarks(&mut |raw| match placemark_to_place(raw) {
        Some(place) => places.push(place),
        None => dropped += 1,
    });

    debug!(
        "Extracted {} placemarks ({} without location dropped)",
        places.len(),
        dropped
    );
    Ok(places)
}
