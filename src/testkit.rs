//! In-memory record graphs for tests.

use crate::model::{
    ChildRef, ChildRelation, DateValue, Event, EventRef, EventRole, EventType, Family,
    FamilyRelation, Gender, Name, NameType, Person,
};
use crate::source::{Dataset, JsonDataSource};

/// Julian day number for a `YYYY-MM-DD` style date.
pub fn jd(text: &str) -> i64 {
    DateValue::parse(text).sort_value()
}

#[derive(Default)]
pub struct GraphBuilder {
    people: Vec<Person>,
    families: Vec<Family>,
    events: Vec<Event>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn person(&mut self, handle: &str) -> PersonEntry<'_> {
        let index = match self.people.iter().position(|p| p.handle == handle) {
            Some(index) => index,
            None => {
                self.people.push(Person {
                    handle: handle.to_string(),
                    display_id: handle.to_string(),
                    gender: Gender::Unknown,
                    primary_name: Name::default(),
                    event_refs: Vec::new(),
                    birth_ref: None,
                    death_ref: None,
                    families: Vec::new(),
                    parent_families: Vec::new(),
                });
                self.people.len() - 1
            }
        };
        PersonEntry { graph: self, index }
    }

    pub fn family(&mut self, handle: &str) -> FamilyEntry<'_> {
        let index = match self.families.iter().position(|f| f.handle == handle) {
            Some(index) => index,
            None => {
                self.families.push(Family {
                    handle: handle.to_string(),
                    display_id: handle.to_string(),
                    father: None,
                    mother: None,
                    relationship: FamilyRelation::Married,
                    children: Vec::new(),
                    event_refs: Vec::new(),
                });
                self.families.len() - 1
            }
        };
        FamilyEntry { graph: self, index }
    }

    fn add_event(&mut self, event_type: EventType, date: DateValue) -> String {
        let handle = format!("E{:04}", self.events.len() + 1);
        self.events.push(Event {
            handle: handle.clone(),
            display_id: handle.clone(),
            event_type,
            date,
        });
        handle
    }

    /// Builds the source, deriving each person's family links from the
    /// families' parent and child lists.
    pub fn build(mut self) -> JsonDataSource {
        for family in &self.families {
            for parent in family.father.iter().chain(family.mother.iter()) {
                if let Some(person) = self.people.iter_mut().find(|p| &p.handle == parent) {
                    person.families.push(family.handle.clone());
                }
            }
            for child in &family.children {
                if let Some(person) = self.people.iter_mut().find(|p| p.handle == child.handle) {
                    person.parent_families.push(family.handle.clone());
                }
            }
        }

        let dataset = Dataset {
            people: self.people,
            families: self.families,
            events: self.events,
        };
        JsonDataSource::from_dataset("memory://test", dataset).expect("test graph should be valid")
    }
}

pub struct PersonEntry<'g> {
    graph: &'g mut GraphBuilder,
    index: usize,
}

impl PersonEntry<'_> {
    fn person(&mut self) -> &mut Person {
        &mut self.graph.people[self.index]
    }

    pub fn male(mut self) -> Self {
        self.person().gender = Gender::Male;
        self
    }

    pub fn female(mut self) -> Self {
        self.person().gender = Gender::Female;
        self
    }

    pub fn named(mut self, first_name: &str, surname: &str) -> Self {
        self.person().primary_name = Name {
            first_name: first_name.to_string(),
            surname: surname.to_string(),
            name_type: NameType::Birth,
        };
        self
    }

    pub fn name_type(mut self, name_type: NameType) -> Self {
        self.person().primary_name.name_type = name_type;
        self
    }

    pub fn event(mut self, event_type: EventType, date: &str, role: EventRole) -> Self {
        let handle = self.graph.add_event(event_type, DateValue::parse(date));
        self.person().event_refs.push(EventRef { handle, role });
        self
    }

    pub fn born(self, date: &str) -> Self {
        self.born_on(DateValue::parse(date))
    }

    pub fn born_on(mut self, date: DateValue) -> Self {
        let handle = self.graph.add_event(EventType::Birth, date);
        let person = self.person();
        person.event_refs.push(EventRef {
            handle: handle.clone(),
            role: EventRole::Primary,
        });
        person.birth_ref = Some(handle);
        self
    }

    pub fn died(self, date: &str) -> Self {
        self.died_on(DateValue::parse(date))
    }

    pub fn died_on(mut self, date: DateValue) -> Self {
        let handle = self.graph.add_event(EventType::Death, date);
        let person = self.person();
        person.event_refs.push(EventRef {
            handle: handle.clone(),
            role: EventRole::Primary,
        });
        person.death_ref = Some(handle);
        self
    }

    pub fn baptised(self, date: &str) -> Self {
        self.event(EventType::Baptism, date, EventRole::Primary)
    }

    pub fn christened(self, date: &str) -> Self {
        self.event(EventType::Christening, date, EventRole::Primary)
    }

    pub fn buried(self, date: &str) -> Self {
        self.event(EventType::Burial, date, EventRole::Primary)
    }
}

pub struct FamilyEntry<'g> {
    graph: &'g mut GraphBuilder,
    index: usize,
}

impl FamilyEntry<'_> {
    fn family(&mut self) -> &mut Family {
        &mut self.graph.families[self.index]
    }

    pub fn father(mut self, handle: &str) -> Self {
        self.family().father = Some(handle.to_string());
        self
    }

    pub fn mother(mut self, handle: &str) -> Self {
        self.family().mother = Some(handle.to_string());
        self
    }

    pub fn relationship(mut self, relationship: FamilyRelation) -> Self {
        self.family().relationship = relationship;
        self
    }

    pub fn child(self, handle: &str) -> Self {
        self.child_with(handle, ChildRelation::Birth, ChildRelation::Birth)
    }

    pub fn child_with(
        mut self,
        handle: &str,
        mother_relation: ChildRelation,
        father_relation: ChildRelation,
    ) -> Self {
        self.family().children.push(ChildRef {
            handle: handle.to_string(),
            mother_relation,
            father_relation,
        });
        self
    }

    pub fn event(mut self, event_type: EventType, date: &str, role: EventRole) -> Self {
        let handle = self.graph.add_event(event_type, DateValue::parse(date));
        self.family().event_refs.push(EventRef { handle, role });
        self
    }

    pub fn married(self, date: &str) -> Self {
        self.event(EventType::Marriage, date, EventRole::Family)
    }

    pub fn divorced(self, date: &str) -> Self {
        self.event(EventType::Divorce, date, EventRole::Family)
    }
}
