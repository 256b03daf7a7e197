//! Spreadsheet export of the participant list.

use chrono::NaiveDate;
use participant_store::{Gender, Participant, REGISTRATION_TIME_FORMAT};
use rust_xlsxwriter::{Color, Format, FormatBorder, RowNum, Workbook, XlsxError};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub const WORKSHEET_NAME: &str = "Participants";

pub const HEADERS: [&str; 10] = [
    "Name",
    "Phone",
    "Age",
    "Gender",
    "City",
    "Region",
    "Country",
    "Registration time",
    "Coordinates",
    "IP address",
];

pub const COLUMN_WIDTHS: [u16; 10] = [25, 20, 10, 15, 20, 20, 20, 25, 30, 20];

pub fn export_filename(date: NaiveDate) -> String {
    format!("participants_{}.xlsx", date.format("%Y-%m-%d"))
}

pub fn gender_label(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "Male",
        Gender::Female => "Female",
    }
}

/// Uppercase the first character, leave the rest untouched.
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One spreadsheet row, in `HEADERS` order. Absent values are blank.
pub fn export_row(participant: &Participant) -> [String; 10] {
    let coordinate_city = participant
        .coordinates
        .as_ref()
        .and_then(|c| c.city.as_deref())
        .filter(|city| !city.is_empty());

    // Region and country only accompany a city taken from `location`
    let (city, region, country) = match (coordinate_city, &participant.location) {
        (Some(city), _) => (city.to_string(), String::new(), String::new()),
        (None, Some(location)) => (
            location.city.clone(),
            location.region.clone(),
            location.country.clone(),
        ),
        (None, None) => Default::default(),
    };

    let coordinates = participant
        .coordinates
        .as_ref()
        .map(|c| format!("{}, {}", c.latitude, c.longitude))
        .unwrap_or_default();

    [
        participant.full_name.clone(),
        participant.phone.clone(),
        participant.age.clone(),
        gender_label(participant.gender).to_string(),
        capitalize(&city),
        capitalize(&region),
        capitalize(&country),
        participant
            .registration_time
            .format(REGISTRATION_TIME_FORMAT)
            .to_string(),
        coordinates,
        participant.ip_address.clone(),
    ]
}

/// Render the participants as an `.xlsx` workbook.
pub fn build_workbook(participants: &[Participant]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();

    let header_format = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x007BFF))
        .set_border(FormatBorder::Thin);
    let cell_format = Format::new().set_border(FormatBorder::Thin);

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(WORKSHEET_NAME)?;

    for (col, (header, width)) in (0u16..).zip(HEADERS.iter().zip(COLUMN_WIDTHS)) {
        worksheet.set_column_width(col, width)?;
        worksheet.write_string_with_format(0, col, *header, &header_format)?;
    }

    for (index, participant) in participants.iter().enumerate() {
        let row = RowNum::try_from(index + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
        for (col, value) in (0u16..).zip(export_row(participant)) {
            worksheet.write_string_with_format(row, col, value, &cell_format)?;
        }
    }

    workbook.save_to_buffer()
}
